//! Error taxonomy for the archive pipeline.
//!
//! Every variant is local to the item it concerns. Only `SourceUnavailable`
//! abandons more than one item, and then only the single day being ingested.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("schedule for {day} unavailable: {reason}")]
    SourceUnavailable { day: String, reason: String },

    #[error("cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("a programme already starts at {0}")]
    DuplicateKey(NaiveDateTime),

    #[error("concatenation into {} failed: {reason}", output.display())]
    Concatenation { output: PathBuf, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        ArchiveError::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly tag, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveError::SourceUnavailable { .. } => "source_unavailable",
            ArchiveError::Parse { .. } => "parse",
            ArchiveError::DuplicateKey(_) => "duplicate_key",
            ArchiveError::Concatenation { .. } => "concatenation",
            ArchiveError::Storage(_) => "storage",
            ArchiveError::Config(_) => "config",
            ArchiveError::Io { .. } => "io",
        }
    }
}

impl From<rusqlite::Error> for ArchiveError {
    fn from(err: rusqlite::Error) -> Self {
        ArchiveError::Storage(err.to_string())
    }
}
