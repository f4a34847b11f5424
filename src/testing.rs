//! Shared fixtures for unit tests: sample payloads, an event recorder and
//! stores that block or fail on demand.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::events::{DataLoadedEvent, DataSavedEvent, SaveEvent, SaveEventBus};
use crate::impl_save_game;
use crate::payload::{SaveContext, SaveObjectHooks};
use crate::store::{MemorySaveStore, SaveRecord, SaveStore};
use crate::subsystems::save_io::SaveIo;
use crate::utilities::errors::StoreError;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Background I/O over a shared in-memory store, on its own one-thread runtime.
pub fn memory_io(store: &MemorySaveStore) -> SaveIo {
    SaveIo::new(Arc::new(store.clone()), 1).expect("save io runtime")
}

/// Payload with lifecycle hooks that records every hook call.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlayerSave {
    pub player_name: RwLock<String>,
    pub level: RwLock<u32>,
    #[serde(skip)]
    hook_log: Mutex<Vec<String>>,
}

impl PlayerSave {
    pub fn with_level(name: &str, level: u32) -> Self {
        Self {
            player_name: RwLock::new(name.to_string()),
            level: RwLock::new(level),
            hook_log: Mutex::new(Vec::new()),
        }
    }

    pub fn level(&self) -> u32 {
        *self.level.read()
    }

    pub fn set_level(&self, level: u32) {
        *self.level.write() = level;
    }

    pub fn set_player_name(&self, name: &str) {
        *self.player_name.write() = name.to_string();
    }

    pub fn hook_calls(&self) -> Vec<String> {
        self.hook_log.lock().clone()
    }
}

impl PartialEq for PlayerSave {
    fn eq(&self, other: &Self) -> bool {
        *self.player_name.read() == *other.player_name.read() && self.level() == other.level()
    }
}

impl SaveObjectHooks for PlayerSave {
    fn on_before_save(&self, ctx: &SaveContext) {
        self.hook_log
            .lock()
            .push(format!("before_save:{}", ctx.slot_name));
    }

    fn on_after_save(&self, ctx: &SaveContext) {
        self.hook_log
            .lock()
            .push(format!("after_save:{}", ctx.slot_name));
    }

    fn on_after_load(&self, ctx: &SaveContext) {
        self.hook_log
            .lock()
            .push(format!("after_load:{}", ctx.slot_name));
    }
}

impl_save_game!(PlayerSave, "PlayerSave", hooks);

/// Payload without hooks, used as "some other class".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelStub {
    pub note: String,
}

impl_save_game!(LevelStub, "LevelStub");

#[derive(Debug, Clone)]
struct Recorded {
    event_type: String,
    success: Option<bool>,
}

/// Records every event emitted on a bus.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<Recorded>>>,
}

impl EventLog {
    pub fn attach(bus: &SaveEventBus) -> Self {
        let log = Self::default();
        let entries = Arc::clone(&log.entries);
        bus.on_any("event-log", move |event: &dyn SaveEvent| {
            let any = event.as_any();
            let success = if let Some(saved) = any.downcast_ref::<DataSavedEvent>() {
                Some(saved.success)
            } else {
                any.downcast_ref::<DataLoadedEvent>()
                    .map(DataLoadedEvent::is_success)
            };
            entries.lock().push(Recorded {
                event_type: event.event_type().to_string(),
                success,
            });
        });
        log
    }

    pub fn types(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|r| r.event_type.clone())
            .collect()
    }

    fn flags(&self, event_type: &str) -> Vec<bool> {
        self.entries
            .lock()
            .iter()
            .filter(|r| r.event_type == event_type)
            .filter_map(|r| r.success)
            .collect()
    }

    /// Success flags of every `data_saved` event, in order.
    pub fn saved_flags(&self) -> Vec<bool> {
        self.flags("data_saved")
    }

    /// Success flags of every `data_loaded` event, in order.
    pub fn loaded_flags(&self) -> Vec<bool> {
        self.flags("data_loaded")
    }
}

/// In-memory store whose writes block until [`open`](Self::open) is called.
#[derive(Debug, Clone, Default)]
pub struct GatedStore {
    inner: MemorySaveStore,
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl GatedStore {
    pub fn closed() -> Self {
        Self::default()
    }

    /// A closed gate in front of existing data.
    pub fn over(inner: MemorySaveStore) -> Self {
        Self {
            inner,
            gate: Arc::default(),
        }
    }

    pub fn open(&self) {
        let (open, cvar) = &*self.gate;
        *open.lock() = true;
        cvar.notify_all();
    }

    fn wait_open(&self) {
        let (open, cvar) = &*self.gate;
        let mut guard = open.lock();
        while !*guard {
            cvar.wait(&mut guard);
        }
    }
}

impl SaveStore for GatedStore {
    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    fn delete(&self, name: &str) -> bool {
        self.inner.delete(name)
    }

    fn save(&self, name: &str, record: &SaveRecord) -> Result<(), StoreError> {
        self.wait_open();
        self.inner.save(name, record)
    }

    fn restore(&self, name: &str) -> Result<Option<SaveRecord>, StoreError> {
        self.inner.restore(name)
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_names()
    }
}

/// Empty store that refuses every write.
#[derive(Debug, Default)]
pub struct FailingStore;

impl SaveStore for FailingStore {
    fn exists(&self, _name: &str) -> bool {
        false
    }

    fn delete(&self, _name: &str) -> bool {
        false
    }

    fn save(&self, _name: &str, _record: &SaveRecord) -> Result<(), StoreError> {
        Err(StoreError::other("disk full"))
    }

    fn restore(&self, _name: &str) -> Result<Option<SaveRecord>, StoreError> {
        Ok(None)
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

/// Store whose every operation panics.
#[derive(Debug, Default)]
pub struct PanickingStore;

impl SaveStore for PanickingStore {
    fn exists(&self, _name: &str) -> bool {
        true
    }

    fn delete(&self, _name: &str) -> bool {
        false
    }

    fn save(&self, name: &str, _record: &SaveRecord) -> Result<(), StoreError> {
        panic!("disk controller gone while writing {}", name)
    }

    fn restore(&self, _name: &str) -> Result<Option<SaveRecord>, StoreError> {
        panic!("disk controller gone")
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

/// Open `gated` from another thread after a short delay.
pub fn open_later(gated: &GatedStore) -> std::thread::JoinHandle<()> {
    let gated = gated.clone();
    std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        gated.open();
    })
}
