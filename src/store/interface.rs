//! Persisted store interface.

use std::fmt;

use super::record::SaveRecord;
use crate::utilities::errors::StoreError;

/// The durable medium holding persisted slots.
///
/// All methods are blocking. The save system calls them inline for
/// synchronous operations and from a background worker for asynchronous
/// ones, so implementations must be thread-safe.
///
/// A store knows nothing about payload classes; it stores and returns
/// [`SaveRecord`]s keyed by slot name.
pub trait SaveStore: Send + Sync + fmt::Debug {
    /// Whether a record exists under `name`.
    fn exists(&self, name: &str) -> bool;

    /// Delete the record under `name`.
    ///
    /// Returns `true` if a record was removed.
    fn delete(&self, name: &str) -> bool;

    /// Write `record` under `name`, replacing any previous record.
    fn save(&self, name: &str, record: &SaveRecord) -> Result<(), StoreError>;

    /// Read the record under `name`.
    ///
    /// Returns `Ok(None)` if nothing is stored under that name.
    fn restore(&self, name: &str) -> Result<Option<SaveRecord>, StoreError>;

    /// Names of every stored record, sorted.
    fn list_names(&self) -> Result<Vec<String>, StoreError>;
}
