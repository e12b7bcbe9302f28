//! Library-level error types.
//!
//! The UI bridge in `commands` flattens these into `String` messages; the
//! checkout flow never surfaces them at all (see `checkout`).

use thiserror::Error;

/// Failure while loading or saving the customer collection.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("customer collection is not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("persistence backend lock poisoned")]
    Lock,
}

/// Invalid value in the process environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
