//! HTTP client for the remote computation service.
//!
//! Dispatch: `POST <submission_url>` with `{"RunId": <run descriptor>, "Container": <container>}`;
//! a 2xx answer carrying `{"Id": "..."}` yields the execution handle.
//!
//! Status: `GET <status_url>/<handle>` answering `{"Status": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use scoreq_state::ArtifactName;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ComputationService, ExecutionHandle, StatusReport};
use crate::error::{DispatchError, RunnerError};

/// Body of a dispatch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(rename = "RunId")]
    pub run_id: String,
    #[serde(rename = "Container")]
    pub container: String,
}

#[derive(Debug, Deserialize)]
struct DispatchResponse {
    #[serde(rename = "Id")]
    id: String,
}

/// Interpret a dispatch answer.
pub fn parse_dispatch_response(
    status: u16,
    body: &str,
) -> Result<ExecutionHandle, DispatchError> {
    if !(200..300).contains(&status) {
        return Err(DispatchError::Rejected {
            status,
            body: body.to_string(),
        });
    }
    let response: DispatchResponse = serde_json::from_str(body)
        .map_err(|e| DispatchError::MalformedResponse(format!("{e}: {body}")))?;
    if response.id.is_empty() {
        return Err(DispatchError::MalformedResponse("empty Id".to_string()));
    }
    Ok(ExecutionHandle(response.id))
}

/// reqwest-backed [`ComputationService`].
pub struct HttpComputationService {
    submission_url: String,
    status_url: String,
    container: String,
    http_client: reqwest::Client,
}

impl HttpComputationService {
    /// Create a client. `status_url` defaults to `submission_url`.
    pub fn new(
        submission_url: &str,
        status_url: Option<&str>,
        container: &str,
        timeout: Duration,
    ) -> Result<Self, RunnerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("scoreq/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RunnerError::HttpClient(e.to_string()))?;

        Ok(HttpComputationService {
            submission_url: submission_url.to_string(),
            status_url: status_url.unwrap_or(submission_url).to_string(),
            container: container.to_string(),
            http_client,
        })
    }

    fn status_endpoint(&self, handle: &ExecutionHandle) -> String {
        format!("{}/{}", self.status_url.trim_end_matches('/'), handle)
    }
}

#[async_trait]
impl ComputationService for HttpComputationService {
    async fn submit(
        &self,
        run_descriptor: &ArtifactName,
    ) -> Result<ExecutionHandle, DispatchError> {
        let request = DispatchRequest {
            run_id: run_descriptor.to_string(),
            container: self.container.clone(),
        };
        info!(run = %run_descriptor, url = %self.submission_url, "Submitting run");

        let response = self
            .http_client
            .post(&self.submission_url)
            .json(&request)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let handle = parse_dispatch_response(status, &body)?;
        debug!(handle = %handle, "Computation service accepted run");
        Ok(handle)
    }

    async fn query_status(&self, handle: &ExecutionHandle) -> Option<StatusReport> {
        let url = self.status_endpoint(handle);
        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(handle = %handle, error = %e, "Status query failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(handle = %handle, status = %response.status(), "Status query rejected");
            return None;
        }

        let document: serde_json::Value = match response.json().await {
            Ok(document) => document,
            Err(e) => {
                warn!(handle = %handle, error = %e, "Malformed status document");
                return None;
            }
        };

        let report = StatusReport::from_document(document);
        if report.is_none() {
            warn!(handle = %handle, "Status document has no recognised Status field");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_field_names() {
        let body = serde_json::to_value(DispatchRequest {
            run_id: "submissions/1/42/run.txt".to_string(),
            container: "bundles".to_string(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"RunId": "submissions/1/42/run.txt", "Container": "bundles"})
        );
    }

    #[test]
    fn test_accepts_created() {
        let handle = parse_dispatch_response(201, r#"{"Id":"abc123","Extra":1}"#).unwrap();
        assert_eq!(handle, ExecutionHandle("abc123".to_string()));
    }

    #[test]
    fn test_server_error_is_rejection() {
        match parse_dispatch_response(500, "boom") {
            Err(DispatchError::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_success_without_id_is_malformed() {
        assert!(matches!(
            parse_dispatch_response(200, r#"{"Status":"ok"}"#),
            Err(DispatchError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_dispatch_response(200, "not json"),
            Err(DispatchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_status_endpoint_joins_handle() {
        let service = HttpComputationService::new(
            "http://svc/runs/",
            None,
            "c",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            service.status_endpoint(&ExecutionHandle("abc".to_string())),
            "http://svc/runs/abc"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_no_status() {
        // Port 1 on loopback is never listening in the test environment.
        let service = HttpComputationService::new(
            "http://127.0.0.1:1/runs",
            None,
            "c",
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(service
            .query_status(&ExecutionHandle("abc".to_string()))
            .await
            .is_none());
        assert!(matches!(
            service.submit(&ArtifactName::new("run.txt")).await,
            Err(DispatchError::Transport(_))
        ));
    }
}
