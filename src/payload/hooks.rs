//! Optional lifecycle capability a payload may expose.

use chrono::{DateTime, Utc};

/// Context handed to payload lifecycle hooks.
#[derive(Debug, Clone)]
pub struct SaveContext {
    /// Slot the payload is being saved to or was loaded from.
    pub slot_name: String,
    /// When the surrounding operation started.
    pub timestamp: DateTime<Utc>,
}

impl SaveContext {
    pub fn new(slot_name: impl Into<String>) -> Self {
        Self {
            slot_name: slot_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle hooks invoked by the save system around persistence.
///
/// Every method defaults to a no-op. A payload opts in by returning
/// `Some(self)` from [`SaveGame::hooks`](super::SaveGame::hooks); payloads
/// that don't are simply skipped.
pub trait SaveObjectHooks: Send + Sync {
    /// Called before the payload is snapshotted for persisting.
    fn on_before_save(&self, _ctx: &SaveContext) {}

    /// Called after the persisted store confirmed the write.
    fn on_after_save(&self, _ctx: &SaveContext) {}

    /// Called once a loaded (or freshly fabricated) payload is cached.
    fn on_after_load(&self, _ctx: &SaveContext) {}
}
