//! Slot managers and the machinery they share.

pub mod level;
pub mod multi_slot;
pub mod save_core;
pub mod save_io;
pub mod single_slot;

pub use level::{LevelActor, LevelSaveData, LevelSaveManager, Transform};
pub use multi_slot::{DuplicateSlotPolicy, SlotRegistry, SlotState};
pub use save_core::IoMode;
pub use save_io::{Completion, SaveIo, Ticket};
pub use single_slot::{FixedSlotName, SingleSlotSaveManager, SlotNameResolver};
