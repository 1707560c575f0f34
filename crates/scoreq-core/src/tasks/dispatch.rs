//! Dispatch task: package a submission and hand it to the backend.

use std::fs;
use std::time::Duration;

use scoreq_state::{Phase, Submission, SubmissionId, SubmissionStatus};
use tracing::{info, warn};

use super::{apply_event, is_dispatchable, Handled, Lifecycle};
use crate::archive::pack_directory;
use crate::backend::{ComputationService, ExecutionBackend, ExecutionHandle, LocalRunner};
use crate::error::{PackagingError, Result};
use crate::lifecycle::LifecycleEvent;
use crate::packager::LocalJob;
use crate::scheduler::{Task, TaskScheduler};

/// Result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The remote service accepted the run.
    Submitted {
        submission_id: SubmissionId,
        handle: ExecutionHandle,
    },
    /// The remote service refused the run or could not be reached.
    Rejected {
        submission_id: SubmissionId,
        reason: String,
    },
    /// A local run exited with code 0.
    LocalCompleted {
        submission_id: SubmissionId,
        exit_code: i32,
    },
    /// A local run exited with a non-zero code.
    LocalFailed {
        submission_id: SubmissionId,
        exit_code: i32,
    },
    /// The submission already left `PendingDispatch`; nothing was sent.
    AlreadyDispatched {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },
}

impl DispatchOutcome {
    pub fn submission_id(&self) -> SubmissionId {
        match self {
            DispatchOutcome::Submitted { submission_id, .. }
            | DispatchOutcome::Rejected { submission_id, .. }
            | DispatchOutcome::LocalCompleted { submission_id, .. }
            | DispatchOutcome::LocalFailed { submission_id, .. }
            | DispatchOutcome::AlreadyDispatched { submission_id, .. } => *submission_id,
        }
    }
}

impl Lifecycle {
    /// Package and dispatch a submission waiting in `PendingDispatch`.
    ///
    /// A redelivered dispatch for a submission in any other state is a
    /// no-op reported as [`DispatchOutcome::AlreadyDispatched`].
    pub async fn dispatch(&self, submission_id: SubmissionId) -> Result<DispatchOutcome> {
        let submission = self.stores.submissions.get_submission(submission_id).await?;
        if !is_dispatchable(submission.status) {
            warn!(
                submission_id = %submission_id,
                status = %submission.status,
                "Submission is not pending dispatch, ignoring"
            );
            return Ok(DispatchOutcome::AlreadyDispatched {
                submission_id,
                status: submission.status,
            });
        }
        let phase = self.stores.submissions.get_phase(submission.phase_id).await?;

        match &self.backend {
            ExecutionBackend::Remote(service) => {
                self.dispatch_remote(service.as_ref(), submission, &phase)
                    .await
            }
            ExecutionBackend::Local(runner) => self.dispatch_local(runner, submission, &phase).await,
        }
    }

    async fn dispatch_remote(
        &self,
        service: &dyn ComputationService,
        mut submission: Submission,
        phase: &Phase,
    ) -> Result<DispatchOutcome> {
        let job = self
            .remote_packager
            .package(self.stores.artifacts.as_ref(), &mut submission, phase)
            .await?;
        self.stores.submissions.save_submission(&submission).await?;

        match service.submit(&job.run_descriptor).await {
            Ok(handle) => {
                apply_event(&mut submission, LifecycleEvent::DispatchAccepted)?;
                submission.execution_key = Some(handle.0.clone());
                self.stores.submissions.save_submission(&submission).await?;
                info!(submission_id = %submission.id, handle = %handle, "Submission dispatched");
                Ok(DispatchOutcome::Submitted {
                    submission_id: submission.id,
                    handle,
                })
            }
            Err(e) => {
                warn!(submission_id = %submission.id, error = %e, "Dispatch rejected");
                apply_event(&mut submission, LifecycleEvent::DispatchRejected)?;
                self.stores.submissions.save_submission(&submission).await?;
                Ok(DispatchOutcome::Rejected {
                    submission_id: submission.id,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn dispatch_local(
        &self,
        runner: &LocalRunner,
        mut submission: Submission,
        phase: &Phase,
    ) -> Result<DispatchOutcome> {
        let job = self
            .local_packager
            .package(self.stores.artifacts.as_ref(), &submission, phase)
            .await?;
        let result = runner.run(&job).await?;

        self.publish_local_output(&mut submission, &job).await?;
        apply_event(
            &mut submission,
            LifecycleEvent::LocalRunFinished {
                success: result.passed(),
            },
        )?;
        self.stores.submissions.save_submission(&submission).await?;

        let submission_id = submission.id;
        if result.passed() {
            info!(submission_id = %submission_id, "Local run completed");
            Ok(DispatchOutcome::LocalCompleted {
                submission_id,
                exit_code: result.exit_code,
            })
        } else {
            warn!(
                submission_id = %submission_id,
                exit_code = result.exit_code,
                "Local run exited with a non-zero code"
            );
            Ok(DispatchOutcome::LocalFailed {
                submission_id,
                exit_code: result.exit_code,
            })
        }
    }

    /// Store the output directory as the output archive, plus the captured
    /// stdout and stderr.
    async fn publish_local_output(&self, submission: &mut Submission, job: &LocalJob) -> Result<()> {
        let artifacts = self.stores.artifacts.as_ref();

        let output_name = submission.output_name();
        let archive = pack_directory(&job.output_dir).map_err(|source| PackagingError::Archive {
            artifact: output_name.to_string(),
            source,
        })?;
        artifacts.write(&output_name, &archive).await?;

        let stdout_name = submission.stdout_name();
        let stderr_name = submission.stderr_name();
        artifacts
            .write(&stdout_name, &read_capture(&job.stdout_path())?)
            .await?;
        artifacts
            .write(&stderr_name, &read_capture(&job.stderr_path())?)
            .await?;

        submission.output_file = Some(output_name);
        submission.stdout_file = Some(stdout_name);
        submission.stderr_file = Some(stderr_name);
        Ok(())
    }

    /// Decide what follows a dispatch.
    pub async fn handle_dispatch_outcome(
        &self,
        outcome: DispatchOutcome,
        scheduler: &dyn TaskScheduler,
    ) -> Result<Handled> {
        match outcome {
            DispatchOutcome::Submitted { submission_id, .. } => {
                let task = Task::Poll {
                    submission_id,
                    attempt: 1,
                };
                scheduler.schedule(task, Duration::ZERO).await?;
                Ok(Handled::Scheduled(task))
            }
            DispatchOutcome::LocalCompleted { submission_id, .. } => {
                Ok(Handled::Ingested(self.ingest(submission_id).await?))
            }
            DispatchOutcome::Rejected { .. }
            | DispatchOutcome::LocalFailed { .. }
            | DispatchOutcome::AlreadyDispatched { .. } => Ok(Handled::Stopped),
        }
    }
}

fn read_capture(path: &std::path::Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(PackagingError::Io(e).into()),
    }
}
