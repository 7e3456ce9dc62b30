//! Error types for castoff-store

use thiserror::Error;

/// Errors that can occur in the storage and distribution layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// An artifact was already stored under this platform key
    #[error("Artifact already stored for platform key: {platform_key}")]
    DuplicateKey { platform_key: String },

    /// No artifact stored under this platform key
    #[error("Artifact not found for platform key: {platform_key}")]
    NotFound { platform_key: String },

    /// Stored payload no longer matches its recorded digest
    #[error("Artifact corrupt for platform key {platform_key}: digest mismatch")]
    CorruptArtifact { platform_key: String },

    /// Release API call failed
    #[error("Release API error: {0}")]
    ReleaseApi(String),

    /// Secondary channel call failed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::ReleaseApi(err.to_string())
    }
}
