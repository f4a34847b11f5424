//! A save manager that owns exactly one slot and one cached payload.

use std::fmt;
use std::sync::Arc;

use crate::config::SaveSystemConfig;
use crate::events::SaveEventBus;
use crate::payload::{downcast_save_game, SaveGame, SaveGameClass, SaveGameRef};
use crate::subsystems::save_core::{IoMode, SaveCore};
use crate::subsystems::save_io::{Completion, SaveIo, Ticket};
use crate::utilities::errors::SlotError;

/// Produces the slot name a [`SingleSlotSaveManager`] reads and writes.
///
/// Override to route a manager to e.g. a per-profile slot. Any
/// `Fn() -> String` closure is a resolver.
pub trait SlotNameResolver: Send + Sync {
    fn slot_name(&self) -> String;
}

impl<F> SlotNameResolver for F
where
    F: Fn() -> String + Send + Sync,
{
    fn slot_name(&self) -> String {
        self()
    }
}

/// Resolver that always returns the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSlotName(pub String);

impl FixedSlotName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl SlotNameResolver for FixedSlotName {
    fn slot_name(&self) -> String {
        self.0.clone()
    }
}

/// Manages a single named slot: save, load, clear, start over.
///
/// Async operations return as soon as they are queued. Their outcome is
/// applied, and announced through [`events`](Self::events), when the owner
/// calls [`poll_completions`](Self::poll_completions),
/// [`flush`](Self::flush) or [`settle`](Self::settle).
pub struct SingleSlotSaveManager {
    core: SaveCore,
    resolver: Box<dyn SlotNameResolver>,
    save_game: Option<SaveGameRef>,
    /// Bumped whenever the cached payload is discarded; older completions are stale.
    epoch: u64,
    load_on_initialize: bool,
}

impl fmt::Debug for SingleSlotSaveManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleSlotSaveManager")
            .field("slot_name", &self.slot_name())
            .field("class", &self.core.class)
            .field("cached", &self.save_game.is_some())
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl SingleSlotSaveManager {
    pub fn new(
        class: Option<SaveGameClass>,
        io: SaveIo,
        resolver: impl SlotNameResolver + 'static,
    ) -> Self {
        Self {
            core: SaveCore::new(class, io),
            resolver: Box::new(resolver),
            save_game: None,
            epoch: 0,
            load_on_initialize: true,
        }
    }

    /// Build a manager over the configured store, using `config.slot_name`.
    pub fn from_config(
        config: &SaveSystemConfig,
        class: Option<SaveGameClass>,
    ) -> Result<Self, SlotError> {
        let io = config.build_io()?;
        Ok(Self::new(class, io, FixedSlotName::new(config.slot_name.clone()))
            .with_load_on_initialize(config.load_on_initialize))
    }

    pub fn with_load_on_initialize(mut self, load: bool) -> Self {
        self.load_on_initialize = load;
        self
    }

    /// Load the slot if the manager is configured to do so on startup.
    pub fn initialize(&mut self, mode: IoMode) -> Result<(), SlotError> {
        if !self.load_on_initialize {
            log::debug!("Skipping initial load of slot {}", self.slot_name());
            return Ok(());
        }
        self.load_data(mode)
    }

    /// Name the manager currently reads and writes.
    pub fn slot_name(&self) -> String {
        self.resolver.slot_name()
    }

    pub fn events(&self) -> &SaveEventBus {
        &self.core.events
    }

    pub fn save_game_class(&self) -> Option<&SaveGameClass> {
        self.core.class.as_ref()
    }

    /// Change the payload class. A cached payload of another class is dropped.
    pub fn set_save_game_class(&mut self, class: Option<SaveGameClass>) {
        let keep = match (&class, &self.save_game) {
            (Some(class), Some(payload)) => class.is_instance(payload.as_ref()),
            _ => false,
        };
        if !keep && self.save_game.is_some() {
            log::info!("Save game class changed; dropping cached save game");
            self.discard_cache();
        }
        self.core.class = class;
    }

    /// The cached payload, if any.
    pub fn save_game(&self) -> Option<SaveGameRef> {
        self.save_game.clone()
    }

    /// The cached payload as a concrete type, if it is one.
    pub fn save_game_as<T: SaveGame>(&self) -> Option<Arc<T>> {
        self.save_game.as_ref().and_then(downcast_save_game::<T>)
    }

    fn discard_cache(&mut self) {
        self.save_game = None;
        self.epoch += 1;
    }

    /// Delete any persisted data for the slot, then optionally load a fresh default.
    pub fn start_new_save(&mut self, load: Option<IoMode>) -> Result<(), SlotError> {
        log::info!("Starting new save in slot {}", self.slot_name());
        self.clear_save();
        match load {
            Some(mode) => self.load_data(mode),
            None => Ok(()),
        }
    }

    /// Persist the cached payload, creating a default one first if nothing is cached.
    pub fn save_data(&mut self, mode: IoMode) -> Result<(), SlotError> {
        let name = self.slot_name();
        log::debug!("Saving slot {} ({:?})", name, mode);
        let payload = match &self.save_game {
            Some(payload) => Arc::clone(payload),
            None => {
                log::info!("No cached save game for slot {}; creating one", name);
                let payload = self.core.new_payload()?;
                self.save_game = Some(Arc::clone(&payload));
                payload
            }
        };
        match mode {
            IoMode::Sync => self.core.save_now(&name, &payload),
            IoMode::Async => self
                .core
                .save_later(Ticket::new(name, self.epoch), &payload),
        }
    }

    /// Load the slot from the store, or fabricate a default payload if nothing is persisted.
    pub fn load_data(&mut self, mode: IoMode) -> Result<(), SlotError> {
        let name = self.slot_name();
        self.core.require_class()?;
        if !self.core.exists(&name) {
            log::info!("No save data in slot {}; creating a new save game", name);
            let payload = self.core.new_payload()?;
            self.install(&name, payload);
            return Ok(());
        }
        match mode {
            IoMode::Sync => match self.core.restore_now(&name) {
                Ok(Some(payload)) => {
                    self.install(&name, payload);
                    Ok(())
                }
                Ok(None) => {
                    let payload = self.core.new_payload()?;
                    self.install(&name, payload);
                    Ok(())
                }
                Err(e) => {
                    self.core.fail_load(&name, e.to_string());
                    Err(e)
                }
            },
            IoMode::Async => {
                log::debug!("Save data exists in slot {}; loading in background", name);
                self.core.load_later(Ticket::new(name, self.epoch));
                Ok(())
            }
        }
    }

    /// Delete the persisted data (if any) and drop the cached payload.
    ///
    /// Background saves queued before the call never reach the store; one
    /// already writing is waited for and then deleted.
    pub fn clear_save(&mut self) {
        let name = self.slot_name();
        self.core.delete(&name, self.epoch + 1);
        self.discard_cache();
    }

    fn install(&mut self, name: &str, payload: SaveGameRef) {
        self.save_game = Some(Arc::clone(&payload));
        self.core.finish_load(name, &payload);
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.epoch && ticket.slot_name == self.slot_name()
    }

    fn apply(&mut self, completion: Completion) {
        if !self.is_current(completion.ticket()) {
            self.core.reject_stale(completion);
            return;
        }
        match completion {
            Completion::Saved {
                ticket,
                payload,
                result,
            } => {
                let outcome = result.map_err(|e| e.to_string());
                self.core
                    .finish_save(&ticket.slot_name, payload.upgrade(), outcome);
            }
            Completion::Restored { ticket, result } => {
                let restored = self
                    .core
                    .decode_restored(result)
                    .and_then(|payload| match payload {
                        Some(payload) => Ok(payload),
                        None => self.core.new_payload(),
                    });
                match restored {
                    Ok(payload) => self.install(&ticket.slot_name, payload),
                    Err(e) => self.core.fail_load(&ticket.slot_name, e.to_string()),
                }
            }
        }
    }

    /// Apply every completion that has arrived. Returns how many were applied.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.core.io.try_next() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Block until background I/O is idle, then apply completions.
    ///
    /// Must not be called from inside an async context; use [`settle`](Self::settle) there.
    pub fn flush(&mut self) -> usize {
        self.core.io.wait_idle_blocking();
        self.poll_completions()
    }

    /// Wait for background I/O to go idle, then apply completions.
    pub async fn settle(&mut self) -> usize {
        self.core.io.wait_idle().await;
        self.poll_completions()
    }

    /// Finish outstanding I/O and drop every observer.
    pub fn shutdown(&mut self) {
        self.flush();
        self.core.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemorySaveStore, SaveRecord, SaveStore};
    use crate::testing::{memory_io, open_later, EventLog, GatedStore, LevelStub, PlayerSave};

    fn manager(store: &MemorySaveStore) -> SingleSlotSaveManager {
        SingleSlotSaveManager::new(
            Some(SaveGameClass::of::<PlayerSave>()),
            memory_io(store),
            FixedSlotName::new("PlayerSlot"),
        )
    }

    #[test]
    fn test_load_without_persisted_data_fabricates_default() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store);
        let log = EventLog::attach(mgr.events());

        mgr.load_data(IoMode::Async).unwrap();
        let player = mgr.save_game_as::<PlayerSave>().unwrap();
        assert_eq!(player.level(), 0);
        assert_eq!(player.hook_calls(), vec!["after_load:PlayerSlot"]);
        assert_eq!(log.loaded_flags(), vec![true]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_then_reload_sync() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store);
        mgr.load_data(IoMode::Sync).unwrap();
        mgr.save_game_as::<PlayerSave>().unwrap().set_level(12);
        mgr.save_data(IoMode::Sync).unwrap();

        let mut other = manager(&store);
        other.load_data(IoMode::Sync).unwrap();
        assert_eq!(other.save_game_as::<PlayerSave>().unwrap().level(), 12);
    }

    #[test]
    fn test_save_creates_payload_when_nothing_cached() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store);
        assert!(mgr.save_game().is_none());

        mgr.save_data(IoMode::Sync).unwrap();
        assert!(mgr.save_game().is_some());
        assert!(store.exists("PlayerSlot"));
    }

    #[test]
    fn test_async_round_trip_through_flush() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store);
        let log = EventLog::attach(mgr.events());

        mgr.save_data(IoMode::Async).unwrap();
        assert_eq!(mgr.flush(), 1);
        assert_eq!(log.saved_flags(), vec![true]);

        mgr.clear_save();
        store
            .save(
                "PlayerSlot",
                &SaveRecord::capture(&PlayerSave::with_level("hero", 5)).unwrap(),
            )
            .unwrap();
        mgr.load_data(IoMode::Async).unwrap();
        assert!(mgr.save_game().is_none());
        assert_eq!(mgr.flush(), 1);
        assert_eq!(mgr.save_game_as::<PlayerSave>().unwrap().level(), 5);
    }

    #[test]
    fn test_clear_save_makes_pending_load_stale() {
        let store = MemorySaveStore::new();
        store
            .save(
                "PlayerSlot",
                &SaveRecord::capture(&PlayerSave::with_level("hero", 5)).unwrap(),
            )
            .unwrap();
        let mut mgr = manager(&store);
        let log = EventLog::attach(mgr.events());

        mgr.load_data(IoMode::Async).unwrap();
        mgr.clear_save();
        mgr.flush();

        assert!(mgr.save_game().is_none());
        assert_eq!(log.loaded_flags(), vec![false]);
    }

    #[test]
    fn test_clear_save_wins_over_pending_async_save() {
        let gated = GatedStore::closed();
        let io = SaveIo::new(Arc::new(gated.clone()), 1).unwrap();
        let mut mgr = SingleSlotSaveManager::new(
            Some(SaveGameClass::of::<PlayerSave>()),
            io,
            FixedSlotName::new("PlayerSlot"),
        );
        mgr.load_data(IoMode::Sync).unwrap();
        mgr.save_game_as::<PlayerSave>().unwrap().set_level(7);
        let log = EventLog::attach(mgr.events());

        mgr.save_data(IoMode::Async).unwrap();
        let opener = open_later(&gated);
        mgr.clear_save();
        opener.join().unwrap();
        mgr.flush();

        assert!(!gated.exists("PlayerSlot"));
        assert_eq!(log.saved_flags(), vec![false]);
        mgr.load_data(IoMode::Sync).unwrap();
        assert_eq!(mgr.save_game_as::<PlayerSave>().unwrap().level(), 0);
    }

    #[test]
    fn test_start_new_save_wins_over_pending_async_save() {
        let store = MemorySaveStore::new();
        store
            .save(
                "PlayerSlot",
                &SaveRecord::capture(&PlayerSave::with_level("hero", 3)).unwrap(),
            )
            .unwrap();
        let gated = GatedStore::over(store);
        let io = SaveIo::new(Arc::new(gated.clone()), 1).unwrap();
        let mut mgr = SingleSlotSaveManager::new(
            Some(SaveGameClass::of::<PlayerSave>()),
            io,
            FixedSlotName::new("PlayerSlot"),
        );
        mgr.load_data(IoMode::Sync).unwrap();
        assert_eq!(mgr.save_game_as::<PlayerSave>().unwrap().level(), 3);

        mgr.save_data(IoMode::Async).unwrap();
        let opener = open_later(&gated);
        mgr.start_new_save(Some(IoMode::Sync)).unwrap();
        opener.join().unwrap();
        mgr.flush();

        assert!(!gated.exists("PlayerSlot"));
        assert_eq!(mgr.save_game_as::<PlayerSave>().unwrap().level(), 0);
    }

    #[test]
    fn test_wrong_class_on_disk_is_failed_load() {
        let store = MemorySaveStore::new();
        store
            .save("PlayerSlot", &SaveRecord::capture(&LevelStub::default()).unwrap())
            .unwrap();
        let mut mgr = manager(&store);
        let log = EventLog::attach(mgr.events());

        mgr.load_data(IoMode::Async).unwrap();
        mgr.flush();
        assert!(mgr.save_game().is_none());
        assert_eq!(log.loaded_flags(), vec![false]);

        let err = mgr.load_data(IoMode::Sync).unwrap_err();
        assert!(matches!(err, SlotError::Payload(_)));
    }

    #[test]
    fn test_start_new_save_deletes_persisted_data() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store);
        mgr.load_data(IoMode::Sync).unwrap();
        mgr.save_game_as::<PlayerSave>().unwrap().set_level(9);
        mgr.save_data(IoMode::Sync).unwrap();

        mgr.start_new_save(Some(IoMode::Sync)).unwrap();
        assert!(!store.exists("PlayerSlot"));
        assert_eq!(mgr.save_game_as::<PlayerSave>().unwrap().level(), 0);

        mgr.start_new_save(None).unwrap();
        assert!(mgr.save_game().is_none());
    }

    #[test]
    fn test_missing_class_aborts_without_state_change() {
        let store = MemorySaveStore::new();
        let mut mgr =
            SingleSlotSaveManager::new(None, memory_io(&store), FixedSlotName::new("PlayerSlot"));
        assert!(matches!(
            mgr.save_data(IoMode::Sync),
            Err(SlotError::NoSaveGameClass)
        ));
        assert!(matches!(
            mgr.load_data(IoMode::Async),
            Err(SlotError::NoSaveGameClass)
        ));
        assert!(mgr.save_game().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_save_game_class_drops_foreign_payload() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store);
        mgr.load_data(IoMode::Sync).unwrap();

        mgr.set_save_game_class(Some(SaveGameClass::of::<PlayerSave>()));
        assert!(mgr.save_game().is_some());

        mgr.set_save_game_class(Some(SaveGameClass::of::<LevelStub>()));
        assert!(mgr.save_game().is_none());
        mgr.load_data(IoMode::Sync).unwrap();
        assert!(mgr.save_game_as::<LevelStub>().is_some());
    }

    #[test]
    fn test_closure_resolver_routes_slot() {
        let store = MemorySaveStore::new();
        let mut mgr = SingleSlotSaveManager::new(
            Some(SaveGameClass::of::<PlayerSave>()),
            memory_io(&store),
            || format!("profile-{}", 2),
        );
        assert_eq!(mgr.slot_name(), "profile-2");
        mgr.save_data(IoMode::Sync).unwrap();
        assert!(store.exists("profile-2"));
    }

    #[test]
    fn test_initialize_respects_flag() {
        let store = MemorySaveStore::new();
        let mut mgr = manager(&store).with_load_on_initialize(false);
        mgr.initialize(IoMode::Sync).unwrap();
        assert!(mgr.save_game().is_none());

        let mut mgr = manager(&store);
        mgr.initialize(IoMode::Sync).unwrap();
        assert!(mgr.save_game().is_some());
    }

    #[tokio::test]
    async fn test_settle_applies_async_save() {
        let store = MemorySaveStore::new();
        let io = SaveIo::with_handle(Arc::new(store.clone()), tokio::runtime::Handle::current());
        let mut mgr = SingleSlotSaveManager::new(
            Some(SaveGameClass::of::<PlayerSave>()),
            io,
            FixedSlotName::new("PlayerSlot"),
        );
        let log = EventLog::attach(mgr.events());

        mgr.save_data(IoMode::Async).unwrap();
        assert_eq!(mgr.settle().await, 1);
        assert_eq!(log.saved_flags(), vec![true]);
        let player = mgr.save_game_as::<PlayerSave>().unwrap();
        assert_eq!(player.hook_calls(), vec!["before_save:PlayerSlot", "after_save:PlayerSlot"]);
    }
}
