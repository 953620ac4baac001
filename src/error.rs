//! Error types
//!
//! Two levels: `StorageError` covers failures of the persistence layer itself,
//! `ApiError` is the taxonomy every public operation reports.

use thiserror::Error;

/// Failures of the underlying persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("corrupt store entry: {0}")]
    Corrupt(String),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Errors returned by store, resolver and controller operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("item with name \"{name}\" already exists in this folder")]
    NameConflict { name: String, parent: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// True for errors caused by the request itself rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound(_) | ApiError::NameConflict { .. } | ApiError::ValidationError(_)
        )
    }
}

impl From<sled::Error> for ApiError {
    fn from(err: sled::Error) -> Self {
        ApiError::StorageUnavailable(StorageError::Sled(err))
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
