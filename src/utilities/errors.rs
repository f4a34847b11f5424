//! Error types for the save system.
//!
//! Three layers, from the bottom up:
//! - [`StoreError`]: failures inside a persisted store backend.
//! - [`PayloadError`]: a payload could not be encoded, decoded, or had the wrong class.
//! - [`SlotError`]: everything a slot manager or registry operation can report.

use thiserror::Error;

/// Errors raised by a [`SaveStore`](crate::store::SaveStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite failure.
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backend cannot represent this slot name.
    #[error("invalid slot name for store: {name:?}")]
    InvalidName { name: String },

    /// Anything else (poisoned locks, worker shutdown, ...).
    #[error("store error: {message}")]
    Other { message: String },
}

impl StoreError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Errors converting between a payload object and its persisted record.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The record was written by a different payload class.
    #[error("save game class mismatch: expected {expected}, found {found}")]
    ClassMismatch { expected: String, found: String },

    /// The record body does not decode into the configured class.
    #[error("failed to decode save game of class {class}: {source}")]
    Decode {
        class: String,
        #[source]
        source: serde_json::Error,
    },

    /// The payload could not be turned into a record body.
    #[error("failed to encode save game of class {class}: {source}")]
    Encode {
        class: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by slot managers and the slot registry.
///
/// Validation variants are detected synchronously and never change state.
#[derive(Debug, Error)]
pub enum SlotError {
    /// Slot names must contain at least one non-whitespace character.
    #[error("slot name is empty")]
    EmptyName,

    /// The name is already registered in memory.
    #[error("slot already registered: {name}")]
    DuplicateName { name: String },

    /// The persisted store already holds data under this name.
    #[error("slot already persisted: {name}")]
    AlreadyPersisted { name: String },

    /// The name is not registered in memory.
    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    /// No slot exists at this creation-order index.
    #[error("no slot at index {index}")]
    InvalidIndex { index: usize },

    /// No payload class is configured, so nothing can be created or restored.
    #[error("no save game class configured")]
    NoSaveGameClass,

    /// A slot-agnostic call was made while no slot is active.
    #[error("no active slot")]
    NoActiveSlot,

    /// The persisted store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The payload failed validation or conversion.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The background I/O runtime could not be started.
    #[error("save io runtime error: {message}")]
    Runtime { message: String },
}

impl SlotError {
    /// Whether this is a synchronous validation failure (bad or unknown name).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SlotError::EmptyName
                | SlotError::DuplicateName { .. }
                | SlotError::AlreadyPersisted { .. }
                | SlotError::UnknownSlot { .. }
                | SlotError::InvalidIndex { .. }
                | SlotError::NoActiveSlot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_wraps_into_slot_error() {
        let err: SlotError = StoreError::other("disk unplugged").into();
        assert!(matches!(err, SlotError::Store(StoreError::Other { .. })));
        assert_eq!(err.to_string(), "store error: disk unplugged");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_errors() {
        assert!(SlotError::EmptyName.is_validation());
        assert!(SlotError::UnknownSlot {
            name: "A".to_string()
        }
        .is_validation());
        assert!(!SlotError::NoSaveGameClass.is_validation());
    }

    #[test]
    fn test_class_mismatch_message() {
        let err = PayloadError::ClassMismatch {
            expected: "PlayerSave".to_string(),
            found: "LevelSave".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "save game class mismatch: expected PlayerSave, found LevelSave"
        );
    }
}
