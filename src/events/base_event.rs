//! Base event types for the save system event bus.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait implemented by every event the save system broadcasts.
pub trait SaveEvent: Any + Send + Sync + fmt::Debug {
    /// Common metadata (id, timestamp, type, sequence).
    fn meta(&self) -> &EventMeta;

    /// Mutable metadata, used by the bus to stamp the emission sequence.
    fn meta_mut(&mut self) -> &mut EventMeta;

    /// Slot the event is about.
    fn slot_name(&self) -> &str;

    /// Borrow as `Any` for typed dispatch.
    fn as_any(&self) -> &dyn Any;

    /// Event type discriminator string (e.g. `"slot_added"`).
    fn event_type(&self) -> &str {
        &self.meta().event_type
    }
}

/// Metadata carried by every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique event identifier (UUID v4).
    pub event_id: String,

    /// UTC timestamp of event creation.
    pub timestamp: DateTime<Utc>,

    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Position in the emitting bus's delivery order, set on emit.
    pub emission_sequence: Option<u64>,
}

impl EventMeta {
    /// Fresh metadata with a new UUID v4 and the current UTC time.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            emission_sequence: None,
        }
    }
}

/// Implement [`SaveEvent`] for a struct with `meta: EventMeta` and
/// `slot_name: String` fields.
#[macro_export]
macro_rules! impl_save_event {
    ($ty:ty) => {
        impl $crate::events::base_event::SaveEvent for $ty {
            fn meta(&self) -> &$crate::events::base_event::EventMeta {
                &self.meta
            }
            fn meta_mut(&mut self) -> &mut $crate::events::base_event::EventMeta {
                &mut self.meta
            }
            fn slot_name(&self) -> &str {
                &self.slot_name
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_meta_new() {
        let a = EventMeta::new("slot_added");
        let b = EventMeta::new("slot_added");
        assert_eq!(a.event_type, "slot_added");
        assert_ne!(a.event_id, b.event_id);
        assert!(a.emission_sequence.is_none());
    }

    #[test]
    fn test_event_meta_serializes_type_field() {
        let meta = EventMeta::new("data_saved");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "data_saved");
    }
}
