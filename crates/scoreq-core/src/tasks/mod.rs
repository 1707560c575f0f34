//! Lifecycle tasks.
//!
//! [`Lifecycle`] owns the storage handles, the selected execution backend and
//! the runner configuration. Each task returns an explicit outcome value; the
//! matching `handle_*_outcome` method decides what happens next (schedule a
//! poll, ingest scores, or stop). Fatal errors travel back to the worker,
//! which hands them to [`Lifecycle::fail_submission`].

pub mod dispatch;
pub mod poll;

use std::path::PathBuf;
use std::sync::Arc;

use scoreq_state::{
    ArtifactStore, ScoreStore, Submission, SubmissionId, SubmissionStatus, SubmissionStore,
};
use tracing::{debug, error, warn};

use crate::backend::ExecutionBackend;
use crate::config::{ExecutionMode, RunnerConfig};
use crate::error::{Result, RunnerError};
use crate::ingest::IngestReport;
use crate::lifecycle::{transition, LifecycleEvent};
use crate::packager::{LocalPackager, RemotePackager};
use crate::scheduler::{Task, TaskScheduler};

pub use dispatch::DispatchOutcome;
pub use poll::PollOutcome;

/// What an outcome handler did.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// A follow-up task was handed to the scheduler.
    Scheduled(Task),
    /// Scores were ingested; the chain is complete.
    Ingested(IngestReport),
    /// The chain ended without scores (rejected dispatch, failed local run).
    Stopped,
}

/// Storage handles used by the lifecycle.
#[derive(Clone)]
pub struct Stores {
    pub submissions: Arc<dyn SubmissionStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub scores: Arc<dyn ScoreStore>,
}

/// The submission lifecycle: dispatch, poll, ingest and failure handling.
pub struct Lifecycle {
    pub(crate) stores: Stores,
    pub(crate) backend: ExecutionBackend,
    pub(crate) config: RunnerConfig,
    pub(crate) local_packager: LocalPackager,
    pub(crate) remote_packager: RemotePackager,
}

impl Lifecycle {
    /// Build a lifecycle whose backend is selected by `config`.
    pub fn from_config(stores: Stores, config: RunnerConfig) -> Result<Self> {
        config.validate()?;
        let backend = ExecutionBackend::from_config(&config)?;
        Ok(Self::new(stores, backend, config))
    }

    /// Build a lifecycle around an already constructed backend.
    pub fn new(stores: Stores, backend: ExecutionBackend, config: RunnerConfig) -> Self {
        let work_root = match &config.mode {
            ExecutionMode::Local { work_root, .. } => work_root.clone(),
            ExecutionMode::Remote { .. } => default_work_root(),
        };
        Lifecycle {
            stores,
            backend,
            local_packager: LocalPackager::new(work_root),
            remote_packager: RemotePackager::new(),
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn backend(&self) -> &ExecutionBackend {
        &self.backend
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Execute one task and apply its outcome handler.
    pub async fn run_task(&self, task: Task, scheduler: &dyn TaskScheduler) -> Result<Handled> {
        match task {
            Task::Dispatch { submission_id } => {
                let outcome = self.dispatch(submission_id).await?;
                self.handle_dispatch_outcome(outcome, scheduler).await
            }
            Task::Poll {
                submission_id,
                attempt,
            } => {
                let outcome = self.poll(submission_id, attempt).await?;
                self.handle_poll_outcome(outcome, scheduler).await
            }
        }
    }

    /// Failure handler for fatal task errors: force the submission to
    /// `Failed`. Secondary errors are logged and swallowed.
    pub async fn fail_submission(&self, submission_id: SubmissionId, err: &RunnerError) {
        error!(submission_id = %submission_id, error = %err, "Submission task failed");

        let submission = match self.stores.submissions.get_submission(submission_id).await {
            Ok(submission) => submission,
            Err(e) => {
                error!(
                    submission_id = %submission_id,
                    error = %e,
                    "Could not load submission to mark it failed"
                );
                return;
            }
        };

        let status = match transition(submission.status, LifecycleEvent::Abort) {
            Ok(Some(status)) => status,
            Ok(None) => return,
            Err(e) => {
                warn!(submission_id = %submission_id, error = %e, "Abort rejected");
                return;
            }
        };

        if let Err(e) = self
            .stores
            .submissions
            .update_status(submission_id, status)
            .await
        {
            error!(
                submission_id = %submission_id,
                error = %e,
                "Could not mark submission failed"
            );
        }
    }
}

/// Apply `event` to the in-memory submission. The caller persists it.
pub(crate) fn apply_event(submission: &mut Submission, event: LifecycleEvent) -> Result<()> {
    if let Some(next) = transition(submission.status, event)? {
        debug!(
            submission_id = %submission.id,
            from = %submission.status,
            to = %next,
            "Status transition"
        );
        submission.set_status(next);
    }
    Ok(())
}

/// Whether `status` still accepts a dispatch.
pub(crate) fn is_dispatchable(status: SubmissionStatus) -> bool {
    status == SubmissionStatus::PendingDispatch
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("scoreq")
}
