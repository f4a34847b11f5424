//! One JSON file per slot in a directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::interface::SaveStore;
use super::record::SaveRecord;
use crate::utilities::errors::StoreError;

const SAVE_EXTENSION: &str = "sav";

/// Longest file name most filesystems accept.
const MAX_FILE_NAME_LEN: usize = 255;

/// Persists each slot as `<hex(slot name)>.sav` inside a directory.
///
/// File names are hex-encoded so slot names stay case-sensitive on
/// case-insensitive filesystems and may contain path separators. Writes go
/// to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    /// Directory holding the save files.
    pub directory: PathBuf,
}

impl FileSaveStore {
    /// Open a store in `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }
        Ok(Self { directory })
    }

    /// Path of the file backing `name`.
    ///
    /// Fails with [`StoreError::InvalidName`] when the encoded name (plus the
    /// temporary-file suffix) does not fit in a file name.
    pub fn slot_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let file_name = format!("{}.{}", hex::encode(name.as_bytes()), SAVE_EXTENSION);
        if file_name.len() + ".tmp".len() > MAX_FILE_NAME_LEN {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.directory.join(file_name))
    }

    fn decode_file_name(path: &Path) -> Option<String> {
        if path.extension()? != SAVE_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl SaveStore for FileSaveStore {
    fn exists(&self, name: &str) -> bool {
        self.slot_path(name).map(|path| path.is_file()).unwrap_or(false)
    }

    fn delete(&self, name: &str) -> bool {
        let Ok(path) = self.slot_path(name) else {
            return false;
        };
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("FileSaveStore::delete: slot={} failed: {}", name, e);
                }
                false
            }
        }
    }

    fn save(&self, name: &str, record: &SaveRecord) -> Result<(), StoreError> {
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory)?;
        }
        let path = self.slot_path(name)?;
        let tmp = path.with_extension(format!("{}.tmp", SAVE_EXTENSION));
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        log::debug!("FileSaveStore::save: slot={} path={}", name, path.display());
        Ok(())
    }

    fn restore(&self, name: &str) -> Result<Option<SaveRecord>, StoreError> {
        let path = self.slot_path(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: SaveRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if let Some(name) = Self::decode_file_name(&path) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
