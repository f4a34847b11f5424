//! Save payloads: the opaque objects persisted into slots.
//!
//! - [`SaveGame`]: what every payload implements (usually via [`impl_save_game!`](crate::impl_save_game)).
//! - [`SaveObjectHooks`]: optional before-save / after-save / after-load callbacks.
//! - [`SaveGameClass`]: factory + decoder for the configured payload type.

pub mod class;
pub mod hooks;
pub mod save_game;

pub use class::SaveGameClass;
pub use hooks::{SaveContext, SaveObjectHooks};
pub use save_game::{downcast_save_game, NamedSaveGame, SaveGame, SaveGameRef, WeakSaveGame};

pub(crate) use save_game::{run_after_load, run_after_save, run_before_save};
