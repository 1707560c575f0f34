//! Polling task.
//!
//! One poll is one status query. The attempt counter travels inside
//! [`Task::Poll`]; a poll that needs a successor returns
//! [`PollOutcome::Rerun`] and the outcome handler schedules it.

use scoreq_state::{SubmissionId, SubmissionStatus};
use tracing::{debug, info, warn};

use super::{Handled, Lifecycle};
use crate::backend::{ExecutionBackend, ExecutionHandle, ExecutionStatus, StatusReport};
use crate::config::QueryFailurePolicy;
use crate::error::{Result, RunnerError};
use crate::lifecycle::{transition, LifecycleEvent};
use crate::scheduler::{Task, TaskScheduler};

/// Result of one status poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still queued or running; poll again with `attempt`.
    Rerun {
        submission_id: SubmissionId,
        attempt: u32,
    },
    /// The backend reported `Finished`.
    Complete {
        submission_id: SubmissionId,
        attempt: u32,
        report: StatusReport,
    },
    /// The backend reported `Failed`.
    Failed {
        submission_id: SubmissionId,
        attempt: u32,
        report: StatusReport,
    },
    /// The attempt counter passed the poll ceiling.
    LimitExceeded {
        submission_id: SubmissionId,
        attempt: u32,
    },
    /// The status query returned nothing.
    QueryFailed {
        submission_id: SubmissionId,
        attempt: u32,
    },
    /// The submission was already terminal; nothing was queried.
    Stale {
        submission_id: SubmissionId,
        attempt: u32,
        status: SubmissionStatus,
    },
}

impl Lifecycle {
    /// Poll the backend once for a dispatched submission.
    ///
    /// A poll delivered after the submission reached `Finished` or `Failed`
    /// is a no-op reported as [`PollOutcome::Stale`].
    pub async fn poll(&self, submission_id: SubmissionId, attempt: u32) -> Result<PollOutcome> {
        let submission = self.stores.submissions.get_submission(submission_id).await?;
        if submission.status.is_terminal() {
            debug!(
                submission_id = %submission_id,
                attempt,
                status = %submission.status,
                "Submission already terminal, ignoring poll"
            );
            return Ok(PollOutcome::Stale {
                submission_id,
                attempt,
                status: submission.status,
            });
        }

        if attempt > self.config.poll_ceiling {
            warn!(
                submission_id = %submission_id,
                attempt,
                ceiling = self.config.poll_ceiling,
                "Poll ceiling exceeded"
            );
            return Ok(PollOutcome::LimitExceeded {
                submission_id,
                attempt,
            });
        }

        let service = match &self.backend {
            ExecutionBackend::Remote(service) => service.clone(),
            ExecutionBackend::Local(_) => return Err(RunnerError::NotPollable { submission_id }),
        };

        let handle = submission
            .execution_key
            .clone()
            .map(ExecutionHandle)
            .ok_or(RunnerError::NotPollable { submission_id })?;

        debug!(submission_id = %submission_id, attempt, handle = %handle, "Querying run status");
        let Some(report) = service.query_status(&handle).await else {
            transition(submission.status, LifecycleEvent::QueryFailed)?;
            warn!(submission_id = %submission_id, attempt, "Status query returned nothing");
            return Ok(PollOutcome::QueryFailed {
                submission_id,
                attempt,
            });
        };

        if let Some(status) = transition(submission.status, LifecycleEvent::Reported(report.status))?
        {
            self.stores
                .submissions
                .update_status(submission_id, status)
                .await?;
        }

        let outcome = match report.status {
            ExecutionStatus::Submitted | ExecutionStatus::Running => PollOutcome::Rerun {
                submission_id,
                attempt: attempt + 1,
            },
            ExecutionStatus::Finished => PollOutcome::Complete {
                submission_id,
                attempt,
                report,
            },
            ExecutionStatus::Failed => PollOutcome::Failed {
                submission_id,
                attempt,
                report,
            },
        };
        Ok(outcome)
    }

    /// Decide what follows a poll.
    pub async fn handle_poll_outcome(
        &self,
        outcome: PollOutcome,
        scheduler: &dyn TaskScheduler,
    ) -> Result<Handled> {
        match outcome {
            PollOutcome::Rerun {
                submission_id,
                attempt,
            } => self.reschedule(scheduler, submission_id, attempt).await,
            PollOutcome::Complete {
                submission_id,
                attempt,
                ..
            } => {
                info!(submission_id = %submission_id, attempt, "Run finished");
                Ok(Handled::Ingested(self.ingest(submission_id).await?))
            }
            PollOutcome::Failed { submission_id, .. } => {
                Err(RunnerError::BackendFailed { submission_id })
            }
            PollOutcome::LimitExceeded {
                submission_id,
                attempt,
            } => Err(RunnerError::QuotaExceeded {
                submission_id,
                attempt,
            }),
            PollOutcome::QueryFailed {
                submission_id,
                attempt,
            } => match self.config.query_failure_policy {
                QueryFailurePolicy::Abandon => Err(RunnerError::Query {
                    submission_id,
                    attempt,
                }),
                QueryFailurePolicy::Requeue => {
                    self.reschedule(scheduler, submission_id, attempt + 1).await
                }
            },
            PollOutcome::Stale { .. } => Ok(Handled::Stopped),
        }
    }

    async fn reschedule(
        &self,
        scheduler: &dyn TaskScheduler,
        submission_id: SubmissionId,
        attempt: u32,
    ) -> Result<Handled> {
        let task = Task::Poll {
            submission_id,
            attempt,
        };
        scheduler.schedule(task, self.config.poll_delay()).await?;
        Ok(Handled::Scheduled(task))
    }
}
