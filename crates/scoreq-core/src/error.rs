//! Error taxonomy for the submission lifecycle.

use scoreq_state::{StorageError, SubmissionId, SubmissionStatus};

use crate::lifecycle::LifecycleEvent;

/// Errors from zip archive handling.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unreadable archive: {0}")]
    Unreadable(#[from] zip::result::ZipError),

    #[error("archive has no member named {member}")]
    MissingMember { member: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors assembling a job's input bundle.
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("program manifest not found at {path}")]
    ManifestMissing { path: String },

    #[error("program manifest has no command entry")]
    NoCommand,

    #[error("command entry has no $program token: {command}")]
    NoProgramToken { command: String },

    #[error("command token names no executable: {token}")]
    EmptyExecutable { token: String },

    #[error("executable not found in program bundle: {path}")]
    MissingExecutable { path: String },

    #[error("failed to unpack {artifact}: {source}")]
    Archive {
        artifact: String,
        #[source]
        source: ArchiveError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors running a job on the local backend.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to start {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job timed out after {timeout_secs} seconds")]
    TimedOut { timeout_secs: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors submitting a run to the remote computation service.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch request failed: {0}")]
    Transport(String),

    #[error("computation service rejected dispatch ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed dispatch response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Errors retrieving and reading a finished run's output.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("output artifact {name} unavailable: {source}")]
    OutputUnavailable {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("output artifact {name} is not a readable archive: {source}")]
    UnreadableArchive {
        name: String,
        #[source]
        source: ArchiveError,
    },

    #[error("output artifact {name} has no scores.txt")]
    ScoresMissing { name: String },
}

/// A lifecycle event that is not valid for the submission's current status.
#[derive(Debug, thiserror::Error)]
#[error("invalid transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: SubmissionStatus,
    pub event: LifecycleEvent,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Umbrella error for lifecycle tasks.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("status query failed for submission {submission_id} (attempt {attempt})")]
    Query {
        submission_id: SubmissionId,
        attempt: u32,
    },

    #[error("computation for submission {submission_id} exceeded its allotted time quota after {attempt} polls")]
    QuotaExceeded {
        submission_id: SubmissionId,
        attempt: u32,
    },

    #[error("computation backend reported failure for submission {submission_id}")]
    BackendFailed { submission_id: SubmissionId },

    #[error("ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("submission {submission_id} has no execution handle to poll")]
    NotPollable { submission_id: SubmissionId },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("task queue is closed")]
    SchedulerClosed,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
