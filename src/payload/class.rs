//! Payload class descriptor: the factory and decoder bound to one payload type.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::save_game::{NamedSaveGame, SaveGame, SaveGameRef};
use crate::store::SaveRecord;
use crate::utilities::errors::PayloadError;

type CreateFn = Arc<dyn Fn() -> SaveGameRef + Send + Sync>;
type DecodeFn = Arc<dyn Fn(Value) -> Result<SaveGameRef, serde_json::Error> + Send + Sync>;

/// The configured payload type of a save manager.
///
/// Creates fresh default payloads and rebuilds payloads from persisted
/// records, refusing records written by another class.
#[derive(Clone)]
pub struct SaveGameClass {
    name: String,
    create: CreateFn,
    decode: DecodeFn,
}

impl fmt::Debug for SaveGameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaveGameClass({})", self.name)
    }
}

impl PartialEq for SaveGameClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl SaveGameClass {
    /// Class descriptor for a serde payload type implemented via `impl_save_game!`.
    pub fn of<T>() -> Self
    where
        T: SaveGame + NamedSaveGame + Default + DeserializeOwned,
    {
        Self {
            name: T::CLASS_NAME.to_string(),
            create: Arc::new(|| Arc::new(T::default()) as SaveGameRef),
            decode: Arc::new(|value| {
                let payload: T = serde_json::from_value(value)?;
                Ok(Arc::new(payload) as SaveGameRef)
            }),
        }
    }

    /// Class descriptor from explicit factory and decoder functions.
    pub fn new<C, D>(name: impl Into<String>, create: C, decode: D) -> Self
    where
        C: Fn() -> SaveGameRef + Send + Sync + 'static,
        D: Fn(Value) -> Result<SaveGameRef, serde_json::Error> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            create: Arc::new(create),
            decode: Arc::new(decode),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a fresh default payload.
    pub fn create(&self) -> SaveGameRef {
        (self.create)()
    }

    /// Whether `payload` was produced by this class.
    pub fn is_instance(&self, payload: &dyn SaveGame) -> bool {
        payload.class_name() == self.name
    }

    /// Rebuild a payload from a persisted record.
    pub fn restore(&self, record: SaveRecord) -> Result<SaveGameRef, PayloadError> {
        if record.class != self.name {
            return Err(PayloadError::ClassMismatch {
                expected: self.name.clone(),
                found: record.class,
            });
        }
        (self.decode)(record.data).map_err(|source| PayloadError::Decode {
            class: self.name.clone(),
            source,
        })
    }
}
