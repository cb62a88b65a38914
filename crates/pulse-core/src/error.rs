use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mail-pulse crates.
#[derive(Error, Debug)]
pub enum PulseError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A whole export file was rejected during ingestion.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A date-range selector could not be interpreted.
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// File-level ingestion failures.
///
/// Each of these rejects one export file; the other files of the same load
/// are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The file contained no bytes (or only whitespace).
    #[error("file is empty")]
    EmptyFile,

    /// The header row could not be located within the scan window.
    #[error("file does not contain enough rows / headers not found (scanned {scanned} rows)")]
    HeaderNotFound { scanned: usize },

    /// Every data row was dropped by validation.
    #[error("no valid rows found ({dropped} rows failed validation)")]
    NoValidRows { dropped: usize },

    /// The CSV text itself was malformed.
    #[error("malformed CSV: {0}")]
    Csv(String),

    /// The load was cancelled before this file finished.
    #[error("load cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the mail-pulse crates.
pub type Result<T> = std::result::Result<T, PulseError>;
