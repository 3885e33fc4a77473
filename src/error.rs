//! Error types for loading, fetching and querying patronage data.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatronageError {
    /// Network failure or a non-2xx response from the data portal
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A row could not be turned into a record (bad date, missing column)
    #[error("parse error: {0}")]
    Parse(String),

    /// Two rows share a date and the load policy rejects duplicates
    #[error("duplicate date: {0}")]
    DuplicateDate(NaiveDate),

    /// Requested range is inverted or outside the data's coverage
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid moving average window: {0}")]
    InvalidWindow(usize),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// Loaded dataset lacks metric columns the source declares
    #[error("missing metric columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PatronageError>;
