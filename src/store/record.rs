//! The unit a persisted store reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::SaveGame;
use crate::utilities::errors::PayloadError;

/// Current record layout version.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// A snapshot of one payload as handed to a [`SaveStore`](super::SaveStore).
///
/// The snapshot is taken on the owning thread, so background writes never
/// touch the live payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    /// Class name of the payload that produced this record.
    pub class: String,
    /// Record layout version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Opaque payload body.
    pub data: Value,
}

fn default_version() -> u32 {
    RECORD_FORMAT_VERSION
}

impl SaveRecord {
    pub fn new(class: impl Into<String>, data: Value) -> Self {
        Self {
            class: class.into(),
            version: RECORD_FORMAT_VERSION,
            saved_at: Utc::now(),
            data,
        }
    }

    /// Snapshot a payload.
    pub fn capture(payload: &dyn SaveGame) -> Result<Self, PayloadError> {
        let data = payload.to_value().map_err(|source| PayloadError::Encode {
            class: payload.class_name().to_string(),
            source,
        })?;
        Ok(Self::new(payload.class_name(), data))
    }
}
