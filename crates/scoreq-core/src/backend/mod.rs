//! Execution backends.
//!
//! Two variants, chosen once from [`RunnerConfig`]:
//! - [`LocalRunner`]: runs an unpacked job as a subprocess and waits for it.
//! - a [`ComputationService`]: accepts a run descriptor, hands back an
//!   execution handle and answers status queries for it.

pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use scoreq_state::ArtifactName;
use serde::{Deserialize, Serialize};

use crate::config::{ExecutionMode, RunnerConfig};
use crate::error::{DispatchError, Result};

pub use local::{LocalRunResult, LocalRunner};
pub use remote::HttpComputationService;

/// Opaque identifier assigned by a remote backend to a dispatched run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(pub String);

impl std::fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the computation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Submitted,
    Running,
    Finished,
    Failed,
}

impl ExecutionStatus {
    /// Parse the service's literal `Status` string.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Submitted" => Some(ExecutionStatus::Submitted),
            "Running" => Some(ExecutionStatus::Running),
            "Finished" => Some(ExecutionStatus::Finished),
            "Failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// A status answer plus the raw document it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: ExecutionStatus,
    pub raw: serde_json::Value,
}

impl StatusReport {
    pub fn new(status: ExecutionStatus) -> Self {
        StatusReport {
            status,
            raw: serde_json::json!({ "Status": status }),
        }
    }

    /// Parse a status document of the form `{"Status": "..."}`.
    pub fn from_document(raw: serde_json::Value) -> Option<Self> {
        let status = raw
            .get("Status")
            .and_then(|s| s.as_str())
            .and_then(ExecutionStatus::parse)?;
        Some(StatusReport { status, raw })
    }
}

/// A remote service that runs jobs described by a run descriptor artifact.
#[async_trait]
pub trait ComputationService: Send + Sync {
    /// Dispatch a run. Any failure to obtain a handle is a `DispatchError`.
    async fn submit(
        &self,
        run_descriptor: &ArtifactName,
    ) -> std::result::Result<ExecutionHandle, DispatchError>;

    /// Query a run's status. `None` means the query itself failed
    /// (network error, malformed answer); it is not a backend `Failed`.
    async fn query_status(&self, handle: &ExecutionHandle) -> Option<StatusReport>;
}

/// The backend selected for this runner.
#[derive(Clone)]
pub enum ExecutionBackend {
    Local(LocalRunner),
    Remote(Arc<dyn ComputationService>),
}

impl ExecutionBackend {
    /// Select the backend named by the configuration.
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        match &config.mode {
            ExecutionMode::Local { timeout_secs, .. } => {
                Ok(ExecutionBackend::Local(LocalRunner::new(*timeout_secs)))
            }
            ExecutionMode::Remote {
                submission_url,
                status_url,
                container,
            } => {
                let service = HttpComputationService::new(
                    submission_url,
                    status_url.as_deref(),
                    container,
                    config.http_timeout(),
                )?;
                Ok(ExecutionBackend::Remote(Arc::new(service)))
            }
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ExecutionBackend::Local(_))
    }
}

impl std::fmt::Debug for ExecutionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionBackend::Local(runner) => f.debug_tuple("Local").field(runner).finish(),
            ExecutionBackend::Remote(_) => f.write_str("Remote(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_statuses() {
        assert_eq!(ExecutionStatus::parse("Submitted"), Some(ExecutionStatus::Submitted));
        assert_eq!(ExecutionStatus::parse("Running"), Some(ExecutionStatus::Running));
        assert_eq!(ExecutionStatus::parse("Finished"), Some(ExecutionStatus::Finished));
        assert_eq!(ExecutionStatus::parse("Failed"), Some(ExecutionStatus::Failed));
        assert_eq!(ExecutionStatus::parse("finished"), None);
        assert_eq!(ExecutionStatus::parse("Queued"), None);
    }

    #[test]
    fn test_status_report_from_document() {
        let report =
            StatusReport::from_document(serde_json::json!({"Status": "Running", "Progress": 40}))
                .unwrap();
        assert_eq!(report.status, ExecutionStatus::Running);
        assert_eq!(report.raw["Progress"], 40);

        assert!(StatusReport::from_document(serde_json::json!({"State": "Running"})).is_none());
        assert!(StatusReport::from_document(serde_json::json!({"Status": 3})).is_none());
    }

    #[test]
    fn test_backend_selected_from_config() {
        let local = ExecutionBackend::from_config(&RunnerConfig::local("/tmp/scoreq")).unwrap();
        assert!(local.is_local());

        let remote =
            ExecutionBackend::from_config(&RunnerConfig::remote("http://127.0.0.1:1/runs", "c"))
                .unwrap();
        assert!(!remote.is_local());
    }
}
