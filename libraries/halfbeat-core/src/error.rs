//! Core error types for Half Beat collaborators

use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors reported by the collaborators the engine depends on
#[derive(Error, Debug)]
pub enum CoreError {
    /// The media backend could not produce a playable URL
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Durable storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network failure talking to the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}
