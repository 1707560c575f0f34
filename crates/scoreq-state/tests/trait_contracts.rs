//! Trait contract tests for SubmissionStore, ArtifactStore, and ScoreStore.
//!
//! These tests verify the behavioral contracts of the storage traits
//! using in-memory fakes. Any conforming implementation must pass these.

use scoreq_state::fakes::{MemoryArtifactStore, MemoryScoreStore, MemorySubmissionStore};
use scoreq_state::storage_traits::*;
use scoreq_state::{
    ArtifactName, CompetitionId, FsArtifactStore, Phase, PhaseId, ScoreDefinition, ScoreRecord,
    StorageError, Submission, SubmissionId, SubmissionStatus,
};

fn seeded_submissions() -> MemorySubmissionStore {
    let store = MemorySubmissionStore::new();
    store.insert_phase(Phase {
        id: PhaseId(1),
        competition_id: CompetitionId(10),
        scoring_program: ArtifactName::new("phases/1/program.zip"),
        reference_data: ArtifactName::new("phases/1/reference.zip"),
    });
    store.insert_submission(Submission::new(
        SubmissionId(42),
        PhaseId(1),
        "uploads/42.zip",
        1,
    ));
    store
}

// ===========================================================================
// SubmissionStore contract tests
// ===========================================================================

#[tokio::test]
async fn submission_get_round_trip() {
    let store = seeded_submissions();
    let submission = store.get_submission(SubmissionId(42)).await.unwrap();

    assert_eq!(submission.phase_id, PhaseId(1));
    assert_eq!(submission.status, SubmissionStatus::PendingDispatch);
}

#[tokio::test]
async fn submission_get_not_found() {
    let store = seeded_submissions();
    let err = store.get_submission(SubmissionId(7)).await.unwrap_err();

    assert!(matches!(err, StorageError::SubmissionNotFound { id: 7 }));
}

#[tokio::test]
async fn phase_get_not_found() {
    let store = seeded_submissions();
    let err = store.get_phase(PhaseId(99)).await.unwrap_err();

    assert!(matches!(err, StorageError::PhaseNotFound { id: 99 }));
}

#[tokio::test]
async fn save_replaces_whole_record() {
    let store = seeded_submissions();
    let mut submission = store.get_submission(SubmissionId(42)).await.unwrap();
    submission.execution_key = Some("abc123".to_string());
    submission.set_status(SubmissionStatus::Submitted);
    store.save_submission(&submission).await.unwrap();

    let reloaded = store.get_submission(SubmissionId(42)).await.unwrap();
    assert_eq!(reloaded.execution_key.as_deref(), Some("abc123"));
    assert_eq!(reloaded.status, SubmissionStatus::Submitted);
}

#[tokio::test]
async fn forced_status_write_is_immediately_visible() {
    let store = seeded_submissions();
    store
        .update_status(SubmissionId(42), SubmissionStatus::Running)
        .await
        .unwrap();

    let reloaded = store.get_submission(SubmissionId(42)).await.unwrap();
    assert_eq!(reloaded.status, SubmissionStatus::Running);
    assert_eq!(
        store.status_history(SubmissionId(42)),
        vec![SubmissionStatus::Running]
    );
}

#[tokio::test]
async fn forced_status_write_unknown_submission_fails() {
    let store = seeded_submissions();
    let err = store
        .update_status(SubmissionId(5), SubmissionStatus::Failed)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::SubmissionNotFound { .. }));
    assert!(store.status_history(SubmissionId(5)).is_empty());
}

// ===========================================================================
// ArtifactStore contract tests
// ===========================================================================

async fn artifact_contract(store: &dyn ArtifactStore) {
    let name = ArtifactName::new("submissions/1/42/run.txt");

    assert!(!store.exists(&name).await.unwrap());
    assert!(matches!(
        store.read(&name).await.unwrap_err(),
        StorageError::ArtifactNotFound { .. }
    ));

    store.write(&name, b"v1").await.unwrap();
    assert!(store.exists(&name).await.unwrap());
    assert_eq!(store.read(&name).await.unwrap(), b"v1");

    store.write(&name, b"v2").await.unwrap();
    assert_eq!(store.read(&name).await.unwrap(), b"v2");
}

#[tokio::test]
async fn memory_artifact_store_contract() {
    artifact_contract(&MemoryArtifactStore::new()).await;
}

#[tokio::test]
async fn fs_artifact_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::new(dir.path()).unwrap();
    artifact_contract(&store).await;
}

// ===========================================================================
// ScoreStore contract tests
// ===========================================================================

#[tokio::test]
async fn definition_lookup_is_scoped_by_competition() {
    let store = MemoryScoreStore::new();
    store.insert_definition(ScoreDefinition::new(1, CompetitionId(10), "accuracy"));

    assert!(store
        .find_definition(CompetitionId(10), "accuracy")
        .await
        .unwrap()
        .is_some());
    assert!(store
        .find_definition(CompetitionId(11), "accuracy")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_definition(CompetitionId(10), "f1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn records_are_not_deduplicated() {
    let store = MemoryScoreStore::new();
    let definition = ScoreDefinition::new(1, CompetitionId(10), "accuracy");

    store
        .create_score(ScoreRecord::new(SubmissionId(42), &definition, 0.5))
        .await
        .unwrap();
    store
        .create_score(ScoreRecord::new(SubmissionId(42), &definition, 0.6))
        .await
        .unwrap();
    store
        .create_score(ScoreRecord::new(SubmissionId(43), &definition, 0.7))
        .await
        .unwrap();

    let records = store.scores_for(SubmissionId(42)).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, 0.5);
    assert_eq!(records[1].value, 0.6);
}
