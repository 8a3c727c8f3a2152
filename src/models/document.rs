//! Represents a stored PDF document and the payload used to record one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata row for one stored document.
///
/// The bytes live in the blob store at `filepath`; this struct never carries
/// the content itself.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Document {
    /// Auto-increment identifier assigned by the record store.
    pub id: i64,

    /// Storage key (sanitized, salted name of the blob).
    pub filename: String,

    /// Display name shown to the user. `None` on deployments whose schema
    /// predates the column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,

    /// Location of the bytes as understood by the blob store.
    pub filepath: String,

    /// Number of bytes actually written to `filepath`.
    pub filesize: i64,

    /// Insertion time, set by the record store.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Name to present on download, falling back to the storage key.
    pub fn display_name(&self) -> &str {
        self.original_filename.as_deref().unwrap_or(&self.filename)
    }
}

/// Values written when the ingestion pipeline records a verified upload.
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub storage_key: String,
    pub display_name: String,
    pub blob_location: String,
    pub size_bytes: i64,
}
