//! Persisted store backends for save slots.

pub mod file_store;
pub mod interface;
pub mod memory_store;
pub mod record;
pub mod sqlite_store;

pub use file_store::FileSaveStore;
pub use interface::SaveStore;
pub use memory_store::MemorySaveStore;
pub use record::{SaveRecord, RECORD_FORMAT_VERSION};
pub use sqlite_store::SqliteSaveStore;
