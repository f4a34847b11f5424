//! # Save System
//!
//! Slot-based persistence for games: create, name, load, save and discard
//! opaque save payloads keyed by slot name, with an "active" slot the rest
//! of the game reads and writes against.
//!
//! Two managers sit on top of a pluggable persisted store:
//! - [`SingleSlotSaveManager`] owns one named slot and its cached payload.
//! - [`SlotRegistry`] owns many slots, an active-slot selector, and keeps the
//!   in-memory cache consistent with the store across sync and async I/O.
//!
//! Async saves and loads run on a background tokio runtime. Their results
//! are applied on the owning thread by `poll_completions`, `flush` or
//! `settle`, and announced through each manager's [`SaveEventBus`].

pub mod config;
pub mod events;
pub mod payload;
pub mod store;
pub mod subsystems;
pub mod utilities;

#[cfg(test)]
mod testing;

pub use config::{SaveSystemConfig, StorageBackend, StorageConfig};
pub use events::{
    DataLoadedEvent, DataSavedEvent, HandlerId, SaveEvent, SaveEventBus, SlotAddedEvent,
    SlotCreatedEvent, SlotRemovedEvent,
};
pub use payload::{
    downcast_save_game, NamedSaveGame, SaveContext, SaveGame, SaveGameClass, SaveGameRef,
    SaveObjectHooks, WeakSaveGame,
};
pub use store::{FileSaveStore, MemorySaveStore, SaveRecord, SaveStore, SqliteSaveStore};
pub use subsystems::{
    DuplicateSlotPolicy, FixedSlotName, IoMode, LevelActor, LevelSaveData, LevelSaveManager,
    SaveIo, SingleSlotSaveManager, SlotNameResolver, SlotRegistry, SlotState, Transform,
};
pub use utilities::errors::{PayloadError, SlotError, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
