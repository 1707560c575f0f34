//! Storage trait definitions for SCOREQ
//!
//! These traits define the data-access boundary of the lifecycle core:
//! - `SubmissionStore`: submissions, phases and forced status writes
//! - `ArtifactStore`: named byte blobs (read/write/exists)
//! - `ScoreStore`: score definitions and score records
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{
    ArtifactName, CompetitionId, Phase, PhaseId, ScoreDefinition, ScoreRecord, Submission,
    SubmissionId, SubmissionStatus,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// SubmissionStore
// ---------------------------------------------------------------------------

/// Submission and phase persistence.
///
/// Guarantees:
/// - `update_status` is written through immediately, so concurrent readers
///   (dashboards, other workers) observe it without waiting for a full save.
/// - `save_submission` replaces the whole record.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Load a submission. Returns `StorageError::SubmissionNotFound` if absent.
    async fn get_submission(&self, id: SubmissionId) -> StorageResult<Submission>;

    /// Load a phase. Returns `StorageError::PhaseNotFound` if absent.
    async fn get_phase(&self, id: PhaseId) -> StorageResult<Phase>;

    /// Persist the full submission record.
    async fn save_submission(&self, submission: &Submission) -> StorageResult<()>;

    /// Forced single-field status write.
    async fn update_status(&self, id: SubmissionId, status: SubmissionStatus)
        -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

/// Named blob storage.
///
/// Guarantees:
/// - `write(name, data)` overwrites any prior version of `name`.
/// - `read(name)` returns the exact bytes last written.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Read a blob. Returns `StorageError::ArtifactNotFound` if absent.
    async fn read(&self, name: &ArtifactName) -> StorageResult<Vec<u8>>;

    /// Write (or overwrite) a blob.
    async fn write(&self, name: &ArtifactName, data: &[u8]) -> StorageResult<()>;

    /// Check whether a blob exists.
    async fn exists(&self, name: &ArtifactName) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// ScoreStore
// ---------------------------------------------------------------------------

/// Score definitions (externally owned) and score records.
///
/// Records are append-only; this layer does not deduplicate them.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Look up a definition by competition and label key.
    async fn find_definition(
        &self,
        competition_id: CompetitionId,
        key: &str,
    ) -> StorageResult<Option<ScoreDefinition>>;

    /// Append a score record.
    async fn create_score(&self, record: ScoreRecord) -> StorageResult<()>;

    /// All records for a submission, in creation order.
    async fn scores_for(&self, submission_id: SubmissionId) -> StorageResult<Vec<ScoreRecord>>;
}
