//! Scoreq-State: persistence boundary for the submission lifecycle
//!
//! This crate owns the data model shared by every lifecycle task and the
//! storage abstractions the tasks talk to. The real data-access layer lives
//! outside this workspace; it plugs in by implementing the traits below.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: a narrow, async, backend-agnostic surface.
//!
//! ## Key Components
//!
//! - `SubmissionStore`: submissions, phases and forced status writes
//! - `ArtifactStore`: named blobs (archives, descriptors, logs)
//! - `ScoreStore`: score definitions and score records
//! - `fakes`: in-memory implementations for tests and the local harness
//! - `FsArtifactStore`: directory-backed artifact store

mod error;
pub mod fakes;
mod fs_artifacts;
mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use fs_artifacts::FsArtifactStore;
pub use schema::{
    ArtifactName, CompetitionId, Phase, PhaseId, ScoreDefinition, ScoreRecord, Submission,
    SubmissionId, SubmissionStatus,
};
pub use storage_traits::{ArtifactStore, ScoreStore, StorageResult, SubmissionStore};
