//! Scripted test doubles for the computation service and the scheduler.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scoreq_state::ArtifactName;

use crate::backend::{ComputationService, ExecutionHandle, ExecutionStatus, StatusReport};
use crate::error::{DispatchError, Result};
use crate::scheduler::{Task, TaskScheduler};

/// A [`ComputationService`] that replays queued answers.
///
/// An exhausted submit queue answers with a transport error; an exhausted
/// status queue answers `None`.
#[derive(Debug, Default)]
pub struct ScriptedComputationService {
    submit_answers: Mutex<VecDeque<std::result::Result<ExecutionHandle, DispatchError>>>,
    status_answers: Mutex<VecDeque<Option<StatusReport>>>,
    submitted: Mutex<Vec<ArtifactName>>,
    queried: Mutex<Vec<ExecutionHandle>>,
}

impl ScriptedComputationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an accepted dispatch returning `handle`.
    pub fn accept(&self, handle: &str) {
        self.submit_answers
            .lock()
            .unwrap()
            .push_back(Ok(ExecutionHandle(handle.to_string())));
    }

    /// Queue a dispatch rejected with an HTTP status.
    pub fn reject(&self, status: u16, body: &str) {
        self.submit_answers
            .lock()
            .unwrap()
            .push_back(Err(DispatchError::Rejected {
                status,
                body: body.to_string(),
            }));
    }

    /// Queue a status answer; `None` is a failed query.
    pub fn push_status(&self, status: Option<ExecutionStatus>) {
        self.status_answers
            .lock()
            .unwrap()
            .push_back(status.map(StatusReport::new));
    }

    /// Run descriptors passed to `submit`, oldest first.
    pub fn submitted(&self) -> Vec<ArtifactName> {
        self.submitted.lock().unwrap().clone()
    }

    /// Number of status queries answered.
    pub fn query_count(&self) -> usize {
        self.queried.lock().unwrap().len()
    }
}

#[async_trait]
impl ComputationService for ScriptedComputationService {
    async fn submit(
        &self,
        run_descriptor: &ArtifactName,
    ) -> std::result::Result<ExecutionHandle, DispatchError> {
        self.submitted.lock().unwrap().push(run_descriptor.clone());
        self.submit_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DispatchError::Transport("no scripted answer".to_string())))
    }

    async fn query_status(&self, handle: &ExecutionHandle) -> Option<StatusReport> {
        self.queried.lock().unwrap().push(handle.clone());
        self.status_answers.lock().unwrap().pop_front().flatten()
    }
}

/// A [`TaskScheduler`] that only records what it was asked to schedule.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(Task, Duration)>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<(Task, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskScheduler for RecordingScheduler {
    async fn schedule(&self, task: Task, delay: Duration) -> Result<()> {
        self.scheduled.lock().unwrap().push((task, delay));
        Ok(())
    }
}
