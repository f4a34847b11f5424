//! Save/load primitives shared by every slot manager.
//!
//! A [`SaveCore`] holds the configured payload class, the background I/O and
//! the observer list. Managers decide *which* slot to touch and keep their
//! own cache; the core knows how to create, persist, restore and announce a
//! payload for a given slot name.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::events::{DataLoadedEvent, DataSavedEvent, SaveEventBus};
use crate::payload::{
    run_after_load, run_after_save, run_before_save, SaveContext, SaveGameClass, SaveGameRef,
    WeakSaveGame,
};
use crate::store::{SaveRecord, SaveStore};
use crate::subsystems::save_io::{Completion, SaveIo, Ticket};
use crate::utilities::errors::{SlotError, StoreError};

/// How a save or load runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// Block until the store has answered.
    Sync,
    /// Return immediately; the outcome arrives as an event once completions are applied.
    Async,
}

#[derive(Debug)]
pub(crate) struct SaveCore {
    pub class: Option<SaveGameClass>,
    pub io: SaveIo,
    pub events: SaveEventBus,
}

impl SaveCore {
    pub fn new(class: Option<SaveGameClass>, io: SaveIo) -> Self {
        Self {
            class,
            io,
            events: SaveEventBus::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SaveStore> {
        self.io.store()
    }

    pub fn require_class(&self) -> Result<&SaveGameClass, SlotError> {
        self.class.as_ref().ok_or_else(|| {
            log::error!("No save game class configured; operation aborted");
            SlotError::NoSaveGameClass
        })
    }

    /// Fabricate a default payload of the configured class.
    pub fn new_payload(&self) -> Result<SaveGameRef, SlotError> {
        Ok(self.require_class()?.create())
    }

    /// Validate and decode a persisted record.
    pub fn decode(&self, record: SaveRecord) -> Result<SaveGameRef, SlotError> {
        Ok(self.require_class()?.restore(record)?)
    }

    /// Restore `name` from the store on the calling thread.
    ///
    /// `Ok(None)` means nothing is persisted under that name.
    pub fn restore_now(&self, name: &str) -> Result<Option<SaveGameRef>, SlotError> {
        self.require_class()?;
        match self.store().restore(name)? {
            Some(record) => self.decode(record).map(Some),
            None => Ok(None),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.store().exists(name)
    }

    /// Delete the persisted copy of `name`, discarding background writes
    /// issued below `generation`.
    pub fn delete(&self, name: &str, generation: u64) -> bool {
        let deleted = self.io.delete(name, generation);
        if !deleted {
            log::warn!("Could not delete persisted data for slot {}", name);
        }
        deleted
    }

    /// Run the before-save hook and snapshot `payload`.
    fn snapshot(&self, name: &str, payload: &SaveGameRef) -> Result<SaveRecord, SlotError> {
        run_before_save(payload.as_ref(), &SaveContext::new(name));
        Ok(SaveRecord::capture(payload.as_ref())?)
    }

    /// Persist `payload` under `name` and report the real outcome.
    pub fn save_now(&self, name: &str, payload: &SaveGameRef) -> Result<(), SlotError> {
        let record = match self.snapshot(name, payload) {
            Ok(record) => record,
            Err(e) => {
                self.events.emit(DataSavedEvent::failed(name, e.to_string()));
                return Err(e);
            }
        };
        let result = self.store().save(name, &record);
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        self.finish_save(name, Some(Arc::clone(payload)), outcome);
        result.map_err(SlotError::from)
    }

    /// Snapshot `payload` now and write it in the background.
    pub fn save_later(
        &mut self,
        ticket: Ticket,
        payload: &SaveGameRef,
    ) -> Result<(), SlotError> {
        let record = match self.snapshot(&ticket.slot_name, payload) {
            Ok(record) => record,
            Err(e) => {
                self.events
                    .emit(DataSavedEvent::failed(&ticket.slot_name, e.to_string()));
                return Err(e);
            }
        };
        let weak: WeakSaveGame = Arc::downgrade(payload);
        self.io.submit_save(ticket, record, weak);
        Ok(())
    }

    /// Read `ticket.slot_name` in the background.
    pub fn load_later(&mut self, ticket: Ticket) {
        self.io.submit_restore(ticket);
    }

    /// Conclude a save: after-save hook on success, then the saved event.
    pub fn finish_save(
        &self,
        name: &str,
        payload: Option<SaveGameRef>,
        outcome: Result<(), String>,
    ) {
        match outcome {
            Ok(()) => {
                log::debug!("Saved slot {}", name);
                if let Some(payload) = payload {
                    run_after_save(payload.as_ref(), &SaveContext::new(name));
                }
                self.events.emit(DataSavedEvent::succeeded(name));
            }
            Err(e) => {
                log::error!("Failed to save slot {}: {}", name, e);
                self.events.emit(DataSavedEvent::failed(name, e));
            }
        }
    }

    /// Run the after-load hook without announcing anything.
    pub fn after_load(&self, name: &str, payload: &SaveGameRef) {
        run_after_load(payload.as_ref(), &SaveContext::new(name));
    }

    /// Conclude a load: after-load hook, then the loaded event.
    pub fn finish_load(&self, name: &str, payload: &SaveGameRef) {
        self.after_load(name, payload);
        self.events
            .emit(DataLoadedEvent::loaded(name, Arc::clone(payload)));
    }

    pub fn fail_load(&self, name: &str, error: impl Into<String>) {
        let error = error.into();
        log::error!("Failed to load slot {}: {}", name, error);
        self.events.emit(DataLoadedEvent::failed(name, error));
    }

    /// Announce the failure of a completion whose slot is gone or was replaced.
    pub fn reject_stale(&self, completion: Completion) {
        let ticket = completion.ticket().clone();
        log::warn!(
            "Discarding stale completion for slot {} (generation {})",
            ticket.slot_name,
            ticket.generation
        );
        let reason = format!("slot {} changed while the operation was running", ticket.slot_name);
        match completion {
            Completion::Saved { .. } => self
                .events
                .emit(DataSavedEvent::failed(&ticket.slot_name, reason)),
            Completion::Restored { .. } => self
                .events
                .emit(DataLoadedEvent::failed(&ticket.slot_name, reason)),
        }
    }

    /// Decode the result of a background restore.
    ///
    /// `Ok(None)` means the store had nothing under the slot name.
    pub fn decode_restored(
        &self,
        result: Result<Option<SaveRecord>, StoreError>,
    ) -> Result<Option<SaveGameRef>, SlotError> {
        match result? {
            Some(record) => self.decode(record).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::downcast_save_game;
    use crate::store::MemorySaveStore;
    use crate::testing::{EventLog, FailingStore, PlayerSave};

    fn core_over(store: Arc<dyn SaveStore>) -> SaveCore {
        let io = SaveIo::new(store, 1).unwrap();
        SaveCore::new(Some(SaveGameClass::of::<PlayerSave>()), io)
    }

    #[test]
    fn test_save_now_runs_hooks_and_reports_success() {
        let store = MemorySaveStore::new();
        let core = core_over(Arc::new(store.clone()));
        let log = EventLog::attach(&core.events);

        let payload: SaveGameRef = Arc::new(PlayerSave::with_level("hero", 3));
        core.save_now("A", &payload).unwrap();

        let player = downcast_save_game::<PlayerSave>(&payload).unwrap();
        assert_eq!(player.hook_calls(), vec!["before_save:A", "after_save:A"]);
        assert_eq!(log.types(), vec!["data_saved"]);
        assert!(log.saved_flags()[0]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_save_skips_after_save_hook() {
        let core = core_over(Arc::new(FailingStore::default()));
        let log = EventLog::attach(&core.events);

        let payload: SaveGameRef = Arc::new(PlayerSave::default());
        let err = core.save_now("A", &payload).unwrap_err();
        assert!(matches!(err, SlotError::Store(_)));

        let player = downcast_save_game::<PlayerSave>(&payload).unwrap();
        assert_eq!(player.hook_calls(), vec!["before_save:A"]);
        assert_eq!(log.saved_flags(), vec![false]);
    }

    #[test]
    fn test_restore_now_without_class_is_configuration_error() {
        let io = SaveIo::new(Arc::new(MemorySaveStore::new()), 1).unwrap();
        let core = SaveCore::new(None, io);
        assert!(matches!(
            core.restore_now("A"),
            Err(SlotError::NoSaveGameClass)
        ));
        assert!(matches!(core.new_payload(), Err(SlotError::NoSaveGameClass)));
    }

    #[test]
    fn test_reject_stale_emits_failure_event() {
        let core = core_over(Arc::new(MemorySaveStore::new()));
        let log = EventLog::attach(&core.events);

        core.reject_stale(Completion::Restored {
            ticket: Ticket::new("A", 4),
            result: Ok(None),
        });

        assert_eq!(log.types(), vec!["data_loaded"]);
        assert_eq!(log.loaded_flags(), vec![false]);
    }
}
