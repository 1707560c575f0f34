//! Work items and deferred scheduling.
//!
//! Every task carries its complete loop state. A poll chain is a sequence of
//! `Task::Poll` items with an increasing `attempt`, each scheduled by the
//! handler of the previous one.

use std::time::Duration;

use async_trait::async_trait;
use scoreq_state::SubmissionId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, RunnerError};

/// A unit of work for the lifecycle worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    Dispatch {
        submission_id: SubmissionId,
    },
    Poll {
        submission_id: SubmissionId,
        attempt: u32,
    },
}

impl Task {
    pub fn submission_id(&self) -> SubmissionId {
        match self {
            Task::Dispatch { submission_id } | Task::Poll { submission_id, .. } => *submission_id,
        }
    }
}

/// Runs a task after a delay.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    async fn schedule(&self, task: Task, delay: Duration) -> Result<()>;
}

/// In-process scheduler feeding a [`crate::worker::Worker`] through an
/// unbounded channel. Delayed tasks wait on a timer of their own, never on a
/// worker.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    /// Create a queue and the receiving end the worker consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (TaskQueue { sender }, receiver)
    }
}

#[async_trait]
impl TaskScheduler for TaskQueue {
    async fn schedule(&self, task: Task, delay: Duration) -> Result<()> {
        debug!(?task, delay_ms = delay.as_millis() as u64, "Scheduling task");
        if delay.is_zero() {
            return self
                .sender
                .send(task)
                .map_err(|_| RunnerError::SchedulerClosed);
        }

        if self.sender.is_closed() {
            return Err(RunnerError::SchedulerClosed);
        }
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(task).is_err() {
                tracing::warn!(?task, "Task queue closed before delayed task was delivered");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_serialization() {
        let task = Task::Poll {
            submission_id: SubmissionId(42),
            attempt: 3,
        };
        let json = serde_json::to_value(task).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"task": "poll", "submission_id": 42, "attempt": 3})
        );
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[tokio::test]
    async fn test_immediate_delivery() {
        let (queue, mut receiver) = TaskQueue::channel();
        let task = Task::Dispatch {
            submission_id: SubmissionId(1),
        };
        queue.schedule(task, Duration::ZERO).await.unwrap();
        assert_eq!(receiver.recv().await, Some(task));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_delivery_waits_for_timer() {
        let (queue, mut receiver) = TaskQueue::channel();
        let task = Task::Poll {
            submission_id: SubmissionId(1),
            attempt: 2,
        };
        queue.schedule(task, Duration::from_secs(5)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(receiver.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(receiver.recv().await, Some(task));
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_tasks() {
        let (queue, receiver) = TaskQueue::channel();
        drop(receiver);
        let task = Task::Dispatch {
            submission_id: SubmissionId(1),
        };
        assert!(matches!(
            queue.schedule(task, Duration::ZERO).await,
            Err(RunnerError::SchedulerClosed)
        ));
    }
}
