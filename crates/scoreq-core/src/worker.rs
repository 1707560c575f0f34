//! Worker loop executing scheduled tasks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::ingest::IngestReport;
use crate::scheduler::{Task, TaskQueue, TaskScheduler};
use crate::tasks::{Handled, Lifecycle};

/// Executes tasks through a [`Lifecycle`], scheduling follow-ups on
/// `scheduler`.
#[derive(Clone)]
pub struct Worker {
    lifecycle: Arc<Lifecycle>,
    scheduler: Arc<dyn TaskScheduler>,
}

impl Worker {
    pub fn new(lifecycle: Arc<Lifecycle>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Worker {
            lifecycle,
            scheduler,
        }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Execute one task. A fatal error runs the failure handler before it
    /// is returned. An invalid transition means the task no longer matches
    /// the stored state; the submission is left as it is.
    pub async fn execute(&self, task: Task) -> Result<Handled> {
        debug!(?task, "Executing task");
        match self.lifecycle.run_task(task, self.scheduler.as_ref()).await {
            Ok(handled) => Ok(handled),
            Err(err @ RunnerError::InvalidTransition(_)) => {
                warn!(?task, error = %err, "Task does not match submission state, dropping");
                Err(err)
            }
            Err(err) => {
                self.lifecycle
                    .fail_submission(task.submission_id(), &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Consume tasks until the channel closes. Each task runs on its own
    /// tokio task; in-flight tasks are awaited before returning.
    pub async fn run(&self, mut receiver: mpsc::UnboundedReceiver<Task>) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                next = receiver.recv() => {
                    let Some(task) = next else { break };
                    let worker = self.clone();
                    in_flight.spawn(async move {
                        // Errors are already reported by the failure handler.
                        let _ = worker.execute(task).await;
                    });
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }
        while in_flight.join_next().await.is_some() {}
        info!("Task queue closed, worker stopped");
    }

    /// Drive one submission's chain in-process, starting from `task`, until
    /// it ingests scores (`Some`) or stops (`None`). Delayed polls wait on
    /// the queue timer.
    pub async fn run_to_completion(
        lifecycle: Arc<Lifecycle>,
        task: Task,
    ) -> Result<Option<IngestReport>> {
        let (queue, mut receiver) = TaskQueue::channel();
        let worker = Worker::new(lifecycle, Arc::new(queue));

        let mut next = task;
        loop {
            match worker.execute(next).await? {
                Handled::Scheduled(_) => {
                    next = receiver.recv().await.ok_or(RunnerError::SchedulerClosed)?;
                }
                Handled::Ingested(report) => return Ok(Some(report)),
                Handled::Stopped => return Ok(None),
            }
        }
    }
}
