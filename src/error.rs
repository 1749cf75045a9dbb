// ⚠️ Entry Errors - per-entry failures
// Anything here is counted and reported; it never aborts the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntryError {
    /// Export file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Export file is not valid entry JSON
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Entry has no usable id, so it cannot be tracked in the ledger
    #[error("entry in {path} has no id")]
    MissingId { path: PathBuf },

    /// Importer binary could not be started
    #[error("failed to run importer `{binary}`: {source}")]
    ImporterSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Importer ran and reported failure
    #[error("importer exited with {status}: {stderr}")]
    ImporterFailed { status: String, stderr: String },

    /// Ledger write failed after a successful import
    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

impl EntryError {
    /// Short label used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            EntryError::Io { .. } => "io",
            EntryError::Json { .. } => "json",
            EntryError::MissingId { .. } => "missing_id",
            EntryError::ImporterSpawn { .. } => "importer_spawn",
            EntryError::ImporterFailed { .. } => "importer_failed",
            EntryError::Ledger(_) => "ledger",
        }
    }
}
