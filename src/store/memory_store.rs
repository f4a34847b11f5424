//! In-memory persisted store.
//!
//! Useful for tests and for games that keep saves only for the session.

use std::sync::Arc;

use dashmap::DashMap;

use super::interface::SaveStore;
use super::record::SaveRecord;
use crate::utilities::errors::StoreError;

/// Thread-safe in-memory store keyed by slot name.
///
/// Cloning shares the underlying map, so a clone handed to a registry and
/// one kept by a test observe the same records.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    records: Arc<DashMap<String, SaveRecord>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.records.clear();
    }
}

impl SaveStore for MemorySaveStore {
    fn exists(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    fn delete(&self, name: &str) -> bool {
        self.records.remove(name).is_some()
    }

    fn save(&self, name: &str, record: &SaveRecord) -> Result<(), StoreError> {
        self.records.insert(name.to_string(), record.clone());
        log::debug!("MemorySaveStore::save: slot={}", name);
        Ok(())
    }

    fn restore(&self, name: &str) -> Result<Option<SaveRecord>, StoreError> {
        Ok(self.records.get(name).map(|r| r.value().clone()))
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
