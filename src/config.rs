//! Save system configuration.
//!
//! Loaded from YAML, then overlaid with environment variables:
//!
//! ```yaml
//! slot_name: PlayerSlot
//! storage:
//!   backend: sqlite            # memory | file | sqlite
//!   path: /var/game/saves.db
//! io_worker_threads: 2
//! duplicate_slot_policy: reject  # reject | idempotent
//! load_on_initialize: true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::store::{FileSaveStore, MemorySaveStore, SaveStore, SqliteSaveStore};
use crate::subsystems::multi_slot::DuplicateSlotPolicy;
use crate::subsystems::save_io::SaveIo;
use crate::utilities::errors::{SlotError, StoreError};
use crate::utilities::paths::{default_sqlite_path, save_storage_path, STORAGE_DIR_ENV};

/// Environment variable selecting the storage backend.
pub const BACKEND_ENV: &str = "SAVE_SYSTEM_BACKEND";

/// Environment variable overriding the single-slot manager's slot name.
pub const SLOT_NAME_ENV: &str = "SAVE_SYSTEM_SLOT_NAME";

/// Which [`SaveStore`] implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File => "file",
            StorageBackend::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => bail!("unknown storage backend {:?}", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory (file backend) or database file (sqlite backend).
    pub path: Option<PathBuf>,
}

/// Top-level configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSystemConfig {
    /// Slot used by a single-slot manager built from this config.
    pub slot_name: String,
    pub storage: StorageConfig,
    /// Threads of the background I/O runtime.
    pub io_worker_threads: usize,
    pub duplicate_slot_policy: DuplicateSlotPolicy,
    /// Whether a single-slot manager loads its slot on `initialize`.
    pub load_on_initialize: bool,
}

impl Default for SaveSystemConfig {
    fn default() -> Self {
        Self {
            slot_name: "PlayerSlot".to_string(),
            storage: StorageConfig::default(),
            io_worker_threads: 2,
            duplicate_slot_policy: DuplicateSlotPolicy::default(),
            load_on_initialize: true,
        }
    }
}

impl SaveSystemConfig {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse save system config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(backend) = lookup(BACKEND_ENV) {
            self.storage.backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", BACKEND_ENV))?;
        }
        if let Some(dir) = lookup(STORAGE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.storage.path = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup(SLOT_NAME_ENV) {
            if name.trim().is_empty() {
                bail!("{} must not be empty", SLOT_NAME_ENV);
            }
            self.slot_name = name;
        }
        Ok(())
    }

    /// Where the configured backend persists, after defaults are applied.
    pub fn storage_path(&self) -> Option<PathBuf> {
        match (self.storage.backend, &self.storage.path) {
            (StorageBackend::Memory, _) => None,
            (_, Some(path)) => Some(path.clone()),
            (StorageBackend::File, None) => Some(save_storage_path()),
            (StorageBackend::Sqlite, None) => Some(default_sqlite_path()),
        }
    }

    /// Open the configured persisted store.
    pub fn open_store(&self) -> Result<Arc<dyn SaveStore>, StoreError> {
        let store: Arc<dyn SaveStore> = match (self.storage.backend, self.storage_path()) {
            (StorageBackend::Memory, _) => Arc::new(MemorySaveStore::new()),
            (StorageBackend::File, Some(dir)) => Arc::new(FileSaveStore::new(dir)?),
            (StorageBackend::Sqlite, Some(db)) => Arc::new(SqliteSaveStore::open(db)?),
            (backend, None) => {
                return Err(StoreError::other(format!(
                    "no storage path for {} backend",
                    backend
                )))
            }
        };
        log::info!(
            "Opened {} save store{}",
            self.storage.backend,
            self.storage_path()
                .map(|p| format!(" at {}", p.display()))
                .unwrap_or_default()
        );
        Ok(store)
    }

    /// Open the store and start a background I/O runtime over it.
    pub fn build_io(&self) -> Result<SaveIo, SlotError> {
        SaveIo::new(self.open_store()?, self.io_worker_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SaveSystemConfig::default();
        assert_eq!(config.slot_name, "PlayerSlot");
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.io_worker_threads, 2);
        assert_eq!(config.duplicate_slot_policy, DuplicateSlotPolicy::Reject);
        assert!(config.load_on_initialize);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SaveSystemConfig::from_yaml_str(
            "storage:\n  backend: sqlite\nduplicate_slot_policy: idempotent\n",
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.duplicate_slot_policy, DuplicateSlotPolicy::Idempotent);
        assert_eq!(config.slot_name, "PlayerSlot");
        assert_eq!(config.io_worker_threads, 2);
    }

    #[test]
    fn test_unknown_backend_is_error() {
        assert!(SaveSystemConfig::from_yaml_str("storage:\n  backend: cloud\n").is_err());
        assert!("cloud".parse::<StorageBackend>().is_err());
        assert_eq!(" SQLite ".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (BACKEND_ENV, "memory"),
            (STORAGE_DIR_ENV, "/tmp/saves"),
            (SLOT_NAME_ENV, "Profile2"),
        ]
        .into_iter()
        .collect();
        let mut config = SaveSystemConfig::default();
        config
            .apply_env_overrides_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/saves")));
        assert_eq!(config.slot_name, "Profile2");
    }

    #[test]
    fn test_env_override_rejects_blank_slot_name() {
        let mut config = SaveSystemConfig::default();
        let result =
            config.apply_env_overrides_from(|k| (k == SLOT_NAME_ENV).then(|| "  ".to_string()));
        assert!(result.is_err());
        assert_eq!(config.slot_name, "PlayerSlot");
    }

    #[test]
    fn test_from_file_and_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let saves = dir.path().join("saves");
        let config_path = dir.path().join("save_system.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "slot_name: Hero").unwrap();
        writeln!(file, "storage:").unwrap();
        writeln!(file, "  backend: file").unwrap();
        writeln!(file, "  path: {}", saves.display()).unwrap();
        drop(file);

        let config = SaveSystemConfig::from_file(&config_path).unwrap();
        assert_eq!(config.slot_name, "Hero");
        assert_eq!(config.storage_path(), Some(saves.clone()));

        let store = config.open_store().unwrap();
        assert!(saves.is_dir());
        assert!(!store.exists("Hero"));
    }

    #[test]
    fn test_from_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SaveSystemConfig::from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_open_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SaveSystemConfig::default();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = Some(dir.path().join("slots.db"));

        let store = config.open_store().unwrap();
        assert!(store.list_names().unwrap().is_empty());
        assert!(dir.path().join("slots.db").exists());
    }

    #[test]
    fn test_memory_backend_has_no_path() {
        let mut config = SaveSystemConfig::default();
        config.storage.backend = StorageBackend::Memory;
        assert_eq!(config.storage_path(), None);
        assert!(config.build_io().is_ok());
    }
}
