use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// All errors produced by the timecourse pipeline.
#[derive(Error, Debug)]
pub enum TimecourseError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The observation window does not satisfy `start < end`.
    #[error("Invalid window: start {start} is not before end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    /// A required column is absent from the input header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A required cell is empty. `row` is 1-based and excludes the header.
    #[error("Missing value for column {column} in row {row}")]
    MissingValue { row: usize, column: &'static str },

    /// A timestamp string did not match any recognised format.
    #[error("Unparseable timestamp: {0}")]
    UnparseableTimestamp(String),

    /// A lucidity label outside the known vocabulary.
    #[error("Unknown lucidity label: {0}")]
    UnknownLabel(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A delimited table could not be read or written.
    #[error("Failed to process table: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed or produced.
    #[error("Failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the timecourse crates.
pub type Result<T> = std::result::Result<T, TimecourseError>;
