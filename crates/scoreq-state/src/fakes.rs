//! In-memory fakes for storage traits
//!
//! Provides `MemorySubmissionStore`, `MemoryArtifactStore`, and
//! `MemoryScoreStore` that satisfy the trait contracts without any external
//! dependencies. Used by the test suites and by the local evaluation harness.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::schema::*;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemorySubmissionStore
// ---------------------------------------------------------------------------

/// In-memory submission store.
///
/// Every forced status write is also appended to a history log so tests can
/// assert on the exact sequence of externally visible states.
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    submissions: Mutex<HashMap<SubmissionId, Submission>>,
    phases: Mutex<HashMap<PhaseId, Phase>>,
    status_writes: Mutex<Vec<(SubmissionId, SubmissionStatus)>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a phase.
    pub fn insert_phase(&self, phase: Phase) {
        self.phases.lock().unwrap().insert(phase.id, phase);
    }

    /// Seed a submission.
    pub fn insert_submission(&self, submission: Submission) {
        self.submissions
            .lock()
            .unwrap()
            .insert(submission.id, submission);
    }

    /// Forced status writes recorded for `id`, oldest first.
    pub fn status_history(&self, id: SubmissionId) -> Vec<SubmissionStatus> {
        self.status_writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(sid, _)| *sid == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn get_submission(&self, id: SubmissionId) -> StorageResult<Submission> {
        let submissions = self.submissions.lock().unwrap();
        submissions
            .get(&id)
            .cloned()
            .ok_or(StorageError::SubmissionNotFound { id: id.0 })
    }

    async fn get_phase(&self, id: PhaseId) -> StorageResult<Phase> {
        let phases = self.phases.lock().unwrap();
        phases
            .get(&id)
            .cloned()
            .ok_or(StorageError::PhaseNotFound { id: id.0 })
    }

    async fn save_submission(&self, submission: &Submission) -> StorageResult<()> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> StorageResult<()> {
        let mut submissions = self.submissions.lock().unwrap();
        let submission = submissions
            .get_mut(&id)
            .ok_or(StorageError::SubmissionNotFound { id: id.0 })?;
        submission.status = status;
        submission.updated_at = Utc::now();
        self.status_writes.lock().unwrap().push((id, status));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactStore
// ---------------------------------------------------------------------------

/// In-memory artifact store backed by a `HashMap<name, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names currently stored, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn read(&self, name: &ArtifactName) -> StorageResult<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap();
        blobs
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| StorageError::ArtifactNotFound {
                name: name.to_string(),
            })
    }

    async fn write(&self, name: &ArtifactName, data: &[u8]) -> StorageResult<()> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, name: &ArtifactName) -> StorageResult<bool> {
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs.contains_key(name.as_str()))
    }
}

// ---------------------------------------------------------------------------
// MemoryScoreStore
// ---------------------------------------------------------------------------

/// In-memory score store: definitions keyed by `(competition, key)`, records
/// kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    definitions: Mutex<HashMap<(CompetitionId, String), ScoreDefinition>>,
    records: Mutex<Vec<ScoreRecord>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a definition.
    pub fn insert_definition(&self, definition: ScoreDefinition) {
        self.definitions
            .lock()
            .unwrap()
            .insert((definition.competition_id, definition.key.clone()), definition);
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn find_definition(
        &self,
        competition_id: CompetitionId,
        key: &str,
    ) -> StorageResult<Option<ScoreDefinition>> {
        let definitions = self.definitions.lock().unwrap();
        Ok(definitions
            .get(&(competition_id, key.to_string()))
            .cloned())
    }

    async fn create_score(&self, record: ScoreRecord) -> StorageResult<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn scores_for(&self, submission_id: SubmissionId) -> StorageResult<Vec<ScoreRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect())
    }
}
