//! Error types for the MX host.

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Construction errors
    #[error("Toolkit library missing")]
    ConfigurationMissing,

    // Attachment errors
    #[error("The namespace {0} is already used")]
    NamespaceCollision(String),

    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),

    // Broadcast errors
    #[error("addHandlers failed for namespace {namespace}: {message}")]
    HandlerBroadcastFailure { namespace: String, message: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
