//! Shared error types and filesystem locations.

pub mod errors;
pub mod paths;

pub use errors::{PayloadError, SlotError, StoreError};
