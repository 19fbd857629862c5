use std::path::PathBuf;
use thiserror::Error;

/// Query-time failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The query produced no terms after tokenization and the caller asked
    /// for at least one.
    #[error("query {query:?} contains no searchable terms")]
    InvalidQuery { query: String },
}

/// A build configuration the index cannot be built with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} weight must be a finite, non-negative number, got {value}")]
    InvalidWeight { field: &'static str, value: f32 },
}

/// Failures reading input records.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("malformed records in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no store array found in {0}")]
    MissingStoreArray(PathBuf),
}

/// Failures saving or loading a persisted index.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("index version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("corrupt index: {0}")]
    Corrupt(String),
}
