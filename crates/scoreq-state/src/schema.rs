//! Data model for submissions, phases and scores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub u64);

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a competition phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhaseId(pub u64);

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitionId(pub u64);

impl std::fmt::Display for CompetitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a stored blob, `/`-separated and relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn new(name: impl Into<String>) -> Self {
        ArtifactName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of a child artifact below this one.
    pub fn join(&self, child: &str) -> Self {
        if self.0.is_empty() {
            ArtifactName(child.to_string())
        } else {
            ArtifactName(format!("{}/{}", self.0.trim_end_matches('/'), child))
        }
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactName {
    fn from(s: &str) -> Self {
        ArtifactName::new(s)
    }
}

impl From<String> for ArtifactName {
    fn from(s: String) -> Self {
        ArtifactName(s)
    }
}

/// Lifecycle status of a submission.
///
/// Transitions: PendingDispatch → Submitted → Running → Finished | Failed.
/// `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingDispatch,
    Submitted,
    Running,
    Finished,
    Failed,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Finished | SubmissionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::PendingDispatch => "pending_dispatch",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Running => "running",
            SubmissionStatus::Finished => "finished",
            SubmissionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A competition stage. Read-only from the lifecycle's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub competition_id: CompetitionId,
    /// Zip archive holding the scoring program and its `metadata` manifest
    pub scoring_program: ArtifactName,
    /// Zip archive holding the reference ("truth") dataset
    pub reference_data: ArtifactName,
}

/// One attempt to run a scoring job for a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub phase_id: PhaseId,
    /// Uploaded submission archive
    pub payload: ArtifactName,
    pub status: SubmissionStatus,
    /// Opaque handle assigned by a remote backend on dispatch
    pub execution_key: Option<String>,
    pub input_file: Option<ArtifactName>,
    pub run_file: Option<ArtifactName>,
    pub stdout_file: Option<ArtifactName>,
    pub stderr_file: Option<ArtifactName>,
    pub output_file: Option<ArtifactName>,
    pub submission_number: u32,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    /// Create a submission waiting to be dispatched.
    pub fn new(
        id: SubmissionId,
        phase_id: PhaseId,
        payload: impl Into<ArtifactName>,
        submission_number: u32,
    ) -> Self {
        Submission {
            id,
            phase_id,
            payload: payload.into(),
            status: SubmissionStatus::PendingDispatch,
            execution_key: None,
            input_file: None,
            run_file: None,
            stdout_file: None,
            stderr_file: None,
            output_file: None,
            submission_number,
            updated_at: Utc::now(),
        }
    }

    /// Root under which every artifact of this submission is stored.
    pub fn artifact_root(&self) -> ArtifactName {
        ArtifactName(format!("submissions/{}/{}", self.phase_id, self.id))
    }

    pub fn input_descriptor_name(&self) -> ArtifactName {
        self.artifact_root().join("input.txt")
    }

    pub fn run_descriptor_name(&self) -> ArtifactName {
        self.artifact_root().join("run.txt")
    }

    pub fn stdout_name(&self) -> ArtifactName {
        self.artifact_root().join("run/stdout.txt")
    }

    pub fn stderr_name(&self) -> ArtifactName {
        self.artifact_root().join("run/stderr.txt")
    }

    pub fn output_name(&self) -> ArtifactName {
        self.artifact_root().join("run/output.zip")
    }

    /// Update the in-memory status and bump `updated_at`.
    pub fn set_status(&mut self, status: SubmissionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Maps a score label onto a competition's leaderboard column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDefinition {
    pub id: u64,
    pub competition_id: CompetitionId,
    /// Label as it appears in `scores.txt`, unique per competition
    pub key: String,
    /// Display name
    pub label: String,
}

impl ScoreDefinition {
    pub fn new(id: u64, competition_id: CompetitionId, key: &str) -> Self {
        ScoreDefinition {
            id,
            competition_id,
            key: key.to_string(),
            label: key.to_string(),
        }
    }
}

/// A numeric score bound to a submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: uuid::Uuid,
    pub submission_id: SubmissionId,
    pub definition_id: u64,
    pub key: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(submission_id: SubmissionId, definition: &ScoreDefinition, value: f64) -> Self {
        ScoreRecord {
            id: uuid::Uuid::new_v4(),
            submission_id,
            definition_id: definition.id,
            key: definition.key.clone(),
            value,
            created_at: Utc::now(),
        }
    }
}
