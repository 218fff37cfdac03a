//! Fetch WordPress posts published after a cutoff date and store them in SQLite.

pub mod config;
pub mod db;
pub mod sync;
pub mod wordpress;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Malformed configuration: {0}")]
    ConfigMalformed(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid date '{0}': expected an ISO-8601 date or date-time")]
    DateFormatInvalid(String),

    #[error("WordPress request failed: {0}")]
    RemoteRequestFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Store directory {path} could not be created: {source}")]
    StoreDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::RemoteRequestFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
