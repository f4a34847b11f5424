//! The opaque payload trait and the macro that implements it.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use super::hooks::{SaveContext, SaveObjectHooks};

/// Shared handle to a cached payload.
pub type SaveGameRef = Arc<dyn SaveGame>;

/// Liveness-checked handle to a payload; must be upgraded before use.
pub type WeakSaveGame = Weak<dyn SaveGame>;

/// An opaque unit of game state that can be persisted to a slot.
///
/// The save system never looks inside a payload. It asks for a JSON body
/// when persisting and hands bodies back to a [`SaveGameClass`](super::SaveGameClass)
/// when restoring. Payloads are shared between the registry and any caller
/// holding a [`SaveGameRef`], so mutable state lives behind interior
/// mutability (e.g. `parking_lot::RwLock`).
///
/// Implement it with [`impl_save_game!`](crate::impl_save_game).
pub trait SaveGame: Any + Send + Sync + fmt::Debug {
    /// Stable class name written into persisted records.
    fn class_name(&self) -> &str;

    /// Serialize the current state into a record body.
    fn to_value(&self) -> Result<Value, serde_json::Error>;

    /// Borrow as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared handle into an `Any` handle for downcasting.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Lifecycle capability check. `None` means no hooks.
    fn hooks(&self) -> Option<&dyn SaveObjectHooks> {
        None
    }
}

/// Compile-time class name of a concrete payload type.
pub trait NamedSaveGame {
    const CLASS_NAME: &'static str;
}

/// Downcast a shared payload handle to its concrete type.
///
/// Returns `None` when the payload is of a different type.
pub fn downcast_save_game<T: SaveGame>(payload: &SaveGameRef) -> Option<Arc<T>> {
    Arc::clone(payload).into_any().downcast::<T>().ok()
}

pub(crate) fn run_before_save(payload: &dyn SaveGame, ctx: &SaveContext) {
    if let Some(hooks) = payload.hooks() {
        hooks.on_before_save(ctx);
    }
}

pub(crate) fn run_after_save(payload: &dyn SaveGame, ctx: &SaveContext) {
    if let Some(hooks) = payload.hooks() {
        hooks.on_after_save(ctx);
    }
}

pub(crate) fn run_after_load(payload: &dyn SaveGame, ctx: &SaveContext) {
    match payload.hooks() {
        Some(hooks) => hooks.on_after_load(ctx),
        None => log::debug!(
            "Save game {} in slot {} has no lifecycle hooks",
            payload.class_name(),
            ctx.slot_name
        ),
    }
}

/// Implement [`SaveGame`] and [`NamedSaveGame`] for a serde type.
///
/// ```rust,ignore
/// impl_save_game!(PlayerSave, "PlayerSave");
/// // with lifecycle hooks (the type must implement `SaveObjectHooks`):
/// impl_save_game!(PlayerSave, "PlayerSave", hooks);
/// ```
#[macro_export]
macro_rules! impl_save_game {
    (@hooks none) => {};
    (@hooks some) => {
        fn hooks(&self) -> Option<&dyn $crate::payload::SaveObjectHooks> {
            Some(self)
        }
    };
    (@impl $ty:ty, $class:expr, $hooks:ident) => {
        impl $crate::payload::NamedSaveGame for $ty {
            const CLASS_NAME: &'static str = $class;
        }

        impl $crate::payload::SaveGame for $ty {
            fn class_name(&self) -> &str {
                $class
            }
            fn to_value(
                &self,
            ) -> Result<$crate::__private::serde_json::Value, $crate::__private::serde_json::Error>
            {
                $crate::__private::serde_json::to_value(self)
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn into_any(
                self: std::sync::Arc<Self>,
            ) -> std::sync::Arc<dyn std::any::Any + Send + Sync> {
                self
            }
            $crate::impl_save_game!(@hooks $hooks);
        }
    };
    ($ty:ty, $class:expr) => {
        $crate::impl_save_game!(@impl $ty, $class, none);
    };
    ($ty:ty, $class:expr, hooks) => {
        $crate::impl_save_game!(@impl $ty, $class, some);
    };
}
