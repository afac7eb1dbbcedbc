//! Error types for the imsg-archive library.
//!
//! Decode-level and filesystem-level anomalies never show up here: they are
//! represented as data (`None` text, `exists == false`). Everything in this
//! enum is something the caller has to see, distinct from "no results".

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading the archive or sending messages.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive could not be opened or probed (missing file, no permission)
    #[error(
        "Cannot open message archive at {}: {source}. \
         If this is chat.db, grant Full Disk Access to your terminal.",
        path.display()
    )]
    Access {
        /// Path that was being opened
        path: PathBuf,
        /// Underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// Query-time database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input rejected before reaching the archive
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The automation surface refused or failed to send
    #[error("Send failed: {0}")]
    Send(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV output errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ArchiveError {
    /// True when the archive itself was unreachable, as opposed to a query failing.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::Access { .. })
    }
}

/// Convenience type alias for Result with `ArchiveError`
pub type Result<T> = std::result::Result<T, ArchiveError>;
