//! Error types for scoreq-state

use thiserror::Error;

/// Errors that can occur at the storage boundary
#[derive(Error, Debug)]
pub enum StorageError {
    /// Submission not found
    #[error("Submission not found: {id}")]
    SubmissionNotFound { id: u64 },

    /// Phase not found
    #[error("Phase not found: {id}")]
    PhaseNotFound { id: u64 },

    /// Artifact not found
    #[error("Artifact not found: {name}")]
    ArtifactNotFound { name: String },

    /// Artifact name cannot be mapped onto the store
    #[error("Invalid artifact name: {name}")]
    InvalidArtifactName { name: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by an external storage backend
    #[error("Storage backend error: {0}")]
    Backend(String),
}
