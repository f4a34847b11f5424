//! Default storage locations for persisted save slots.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the storage directory.
pub const STORAGE_DIR_ENV: &str = "SAVE_SYSTEM_STORAGE_DIR";

/// Environment variable overriding the project name used in the default path.
pub const PROJECT_NAME_ENV: &str = "SAVE_SYSTEM_PROJECT";

/// Returns the directory save slots are persisted to by default.
///
/// `SAVE_SYSTEM_STORAGE_DIR` wins when set. Otherwise a platform data
/// directory is used:
/// - Linux: `~/.local/share/SaveSystem/<project>`
/// - macOS: `~/Library/Application Support/SaveSystem/<project>`
/// - Windows: `%LOCALAPPDATA%\SaveSystem\<project>`
///
/// The directory is not created here; stores create it when they open.
pub fn save_storage_path() -> PathBuf {
    if let Ok(dir) = env::var(STORAGE_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    let app_name = project_directory_name();
    let app_author = "SaveSystem";

    if cfg!(target_os = "linux") {
        let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(app_author)
            .join(&app_name)
    } else if cfg!(target_os = "macos") {
        let home = env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join(app_author)
            .join(&app_name)
    } else if cfg!(target_os = "windows") {
        let local_app_data = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("APPDATA").unwrap_or_else(|_| "C:\\tmp".to_string()));
        PathBuf::from(local_app_data).join(app_author).join(&app_name)
    } else {
        PathBuf::from("/tmp").join(app_author).join(&app_name)
    }
}

/// Returns the project name used as the last path component.
///
/// Uses `SAVE_SYSTEM_PROJECT` if set, otherwise the current working
/// directory name.
pub fn project_directory_name() -> String {
    env::var(PROJECT_NAME_ENV).unwrap_or_else(|_| {
        env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| "save_system_default".to_string())
    })
}

/// Default database file for the SQLite backend.
pub fn default_sqlite_path() -> PathBuf {
    save_storage_path().join("save_slots.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sqlite_path_is_inside_storage_dir() {
        let db = default_sqlite_path();
        assert_eq!(db.file_name().unwrap(), "save_slots.db");
        assert_eq!(db.parent().unwrap(), save_storage_path());
    }

    #[test]
    fn test_project_directory_name_not_empty() {
        assert!(!project_directory_name().is_empty());
    }
}
