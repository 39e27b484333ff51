//! Error types for annoq.

use thiserror::Error;

/// Result type alias using annoq's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for annoq operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed schema validation (client fault, no compilation attempted)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Schema registry failed to load (fatal at data-source selection)
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    /// A backend engine could not be reached or rejected the query
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Annotation job not found
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Cooperative cancellation observed at a checkpoint
    #[error("Cancelled")]
    Cancelled,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Status cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::BackendUnavailable(e.to_string())
    }
}
