//! Slot lifecycle and data events.

use crate::events::base_event::EventMeta;
use crate::impl_save_event;
use crate::payload::SaveGameRef;

// ---------------------------------------------------------------------------
// Registry events
// ---------------------------------------------------------------------------

/// A slot became registered (created, restored from the store, or discovered).
#[derive(Debug, Clone)]
pub struct SlotAddedEvent {
    pub meta: EventMeta,
    pub slot_name: String,
    /// Creation-order index of the slot at the time of the event.
    pub index: usize,
}

impl SlotAddedEvent {
    pub fn new(slot_name: impl Into<String>, index: usize) -> Self {
        Self {
            meta: EventMeta::new("slot_added"),
            slot_name: slot_name.into(),
            index,
        }
    }
}

impl_save_event!(SlotAddedEvent);

/// A slot was removed from the registry.
#[derive(Debug, Clone)]
pub struct SlotRemovedEvent {
    pub meta: EventMeta,
    pub slot_name: String,
    /// Index the slot had before removal.
    pub index: usize,
}

impl SlotRemovedEvent {
    pub fn new(slot_name: impl Into<String>, index: usize) -> Self {
        Self {
            meta: EventMeta::new("slot_removed"),
            slot_name: slot_name.into(),
            index,
        }
    }
}

impl_save_event!(SlotRemovedEvent);

/// A brand-new payload was fabricated for a slot (nothing was persisted).
#[derive(Debug, Clone)]
pub struct SlotCreatedEvent {
    pub meta: EventMeta,
    pub slot_name: String,
    pub index: usize,
}

impl SlotCreatedEvent {
    pub fn new(slot_name: impl Into<String>, index: usize) -> Self {
        Self {
            meta: EventMeta::new("slot_created"),
            slot_name: slot_name.into(),
            index,
        }
    }
}

impl_save_event!(SlotCreatedEvent);

// ---------------------------------------------------------------------------
// Data events
// ---------------------------------------------------------------------------

/// A load finished. `payload` is `None` when the load failed.
#[derive(Debug, Clone)]
pub struct DataLoadedEvent {
    pub meta: EventMeta,
    pub slot_name: String,
    pub payload: Option<SaveGameRef>,
    pub error: Option<String>,
}

impl DataLoadedEvent {
    pub fn loaded(slot_name: impl Into<String>, payload: SaveGameRef) -> Self {
        Self {
            meta: EventMeta::new("data_loaded"),
            slot_name: slot_name.into(),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(slot_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            meta: EventMeta::new("data_loaded"),
            slot_name: slot_name.into(),
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.payload.is_some()
    }
}

impl_save_event!(DataLoadedEvent);

/// A save finished, successfully or not.
#[derive(Debug, Clone)]
pub struct DataSavedEvent {
    pub meta: EventMeta,
    pub slot_name: String,
    pub success: bool,
    pub error: Option<String>,
}

impl DataSavedEvent {
    pub fn succeeded(slot_name: impl Into<String>) -> Self {
        Self {
            meta: EventMeta::new("data_saved"),
            slot_name: slot_name.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(slot_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            meta: EventMeta::new("data_saved"),
            slot_name: slot_name.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

impl_save_event!(DataSavedEvent);
