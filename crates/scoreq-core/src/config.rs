//! Runner configuration.
//!
//! The execution mode is chosen once here and injected into
//! [`crate::backend::ExecutionBackend::from_config`]; call sites never
//! inspect URLs or strings to decide between local and remote execution.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default maximum number of status polls before a run is abandoned.
pub const DEFAULT_POLL_CEILING: u32 = 1000;

/// Default delay between two status polls.
pub const DEFAULT_POLL_DELAY_SECS: u64 = 5;

/// Default timeout for requests to the computation service.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Where jobs are executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Unpack and run the scoring program as a local subprocess.
    Local {
        /// Parent directory of per-submission job directories
        work_root: PathBuf,
        /// Wall-clock limit for the scoring program (0 = unlimited)
        #[serde(default)]
        timeout_secs: u64,
    },
    /// Hand the run descriptor to a remote computation service.
    Remote {
        /// Endpoint receiving `{"RunId", "Container"}` dispatch requests
        submission_url: String,
        /// Base URL for `GET <status_url>/<handle>`; defaults to `submission_url`
        #[serde(default)]
        status_url: Option<String>,
        /// Storage container the service reads artifacts from
        container: String,
    },
}

/// What the poll outcome handler does when a status query returns nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFailurePolicy {
    /// Raise a fatal error; the failure handler marks the submission Failed.
    #[default]
    Abandon,
    /// Schedule the next poll attempt after the poll delay. A failed query
    /// consumes an attempt, so the poll ceiling still applies.
    Requeue,
}

/// Configuration for the submission lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub mode: ExecutionMode,
    pub poll_ceiling: u32,
    pub poll_delay_secs: u64,
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub query_failure_policy: QueryFailurePolicy,
}

impl RunnerConfig {
    /// Local-mode configuration rooted at `work_root`.
    pub fn local(work_root: impl Into<PathBuf>) -> Self {
        Self::with_mode(ExecutionMode::Local {
            work_root: work_root.into(),
            timeout_secs: 0,
        })
    }

    /// Remote-mode configuration.
    pub fn remote(submission_url: &str, container: &str) -> Self {
        Self::with_mode(ExecutionMode::Remote {
            submission_url: submission_url.to_string(),
            status_url: None,
            container: container.to_string(),
        })
    }

    fn with_mode(mode: ExecutionMode) -> Self {
        RunnerConfig {
            mode,
            poll_ceiling: DEFAULT_POLL_CEILING,
            poll_delay_secs: DEFAULT_POLL_DELAY_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            query_failure_policy: QueryFailurePolicy::default(),
        }
    }

    pub fn with_poll_delay(mut self, secs: u64) -> Self {
        self.poll_delay_secs = secs;
        self
    }

    pub fn with_poll_ceiling(mut self, ceiling: u32) -> Self {
        self.poll_ceiling = ceiling;
        self
    }

    pub fn with_query_failure_policy(mut self, policy: QueryFailurePolicy) -> Self {
        self.query_failure_policy = policy;
        self
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Build a configuration from `SCOREQ_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup("SCOREQ_MODE").unwrap_or_else(|| "local".to_string());
        let mode = match mode.to_ascii_lowercase().as_str() {
            "local" => ExecutionMode::Local {
                work_root: lookup("SCOREQ_WORK_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| std::env::temp_dir().join("scoreq")),
                timeout_secs: parse_or(&lookup, "SCOREQ_LOCAL_TIMEOUT_SECS", 0)?,
            },
            "remote" => ExecutionMode::Remote {
                submission_url: lookup("SCOREQ_SUBMISSION_URL")
                    .ok_or(ConfigError::Missing("SCOREQ_SUBMISSION_URL"))?,
                status_url: lookup("SCOREQ_STATUS_URL"),
                container: lookup("SCOREQ_CONTAINER")
                    .ok_or(ConfigError::Missing("SCOREQ_CONTAINER"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "SCOREQ_MODE",
                    value: other.to_string(),
                })
            }
        };

        let query_failure_policy = match lookup("SCOREQ_QUERY_FAILURE_POLICY").as_deref() {
            None | Some("abandon") => QueryFailurePolicy::Abandon,
            Some("requeue") => QueryFailurePolicy::Requeue,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SCOREQ_QUERY_FAILURE_POLICY",
                    value: other.to_string(),
                })
            }
        };

        let config = RunnerConfig {
            mode,
            poll_ceiling: parse_or(&lookup, "SCOREQ_POLL_CEILING", DEFAULT_POLL_CEILING)?,
            poll_delay_secs: parse_or(&lookup, "SCOREQ_POLL_DELAY_SECS", DEFAULT_POLL_DELAY_SECS)?,
            http_timeout_secs: parse_or(
                &lookup,
                "SCOREQ_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
            query_failure_policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the lifecycle misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_ceiling == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_ceiling",
                value: "0".to_string(),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "http_timeout_secs",
                value: "0".to_string(),
            });
        }
        if let ExecutionMode::Remote { submission_url, .. } = &self.mode {
            if !submission_url.starts_with("http://") && !submission_url.starts_with("https://")
            {
                return Err(ConfigError::Invalid {
                    key: "submission_url",
                    value: submission_url.clone(),
                });
            }
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_local_mode() {
        let config = RunnerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(matches!(config.mode, ExecutionMode::Local { .. }));
        assert_eq!(config.poll_ceiling, 1000);
        assert_eq!(config.poll_delay(), Duration::from_secs(5));
        assert_eq!(config.query_failure_policy, QueryFailurePolicy::Abandon);
    }

    #[test]
    fn test_remote_mode_from_lookup() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            ("SCOREQ_MODE", "remote"),
            ("SCOREQ_SUBMISSION_URL", "https://compute.example.com/runs"),
            ("SCOREQ_CONTAINER", "bundles"),
            ("SCOREQ_POLL_DELAY_SECS", "2"),
        ]))
        .unwrap();

        assert_eq!(
            config.mode,
            ExecutionMode::Remote {
                submission_url: "https://compute.example.com/runs".to_string(),
                status_url: None,
                container: "bundles".to_string(),
            }
        );
        assert_eq!(config.poll_delay_secs, 2);
    }

    #[test]
    fn test_remote_mode_requires_container() {
        let err = RunnerConfig::from_lookup(lookup_from(&[
            ("SCOREQ_MODE", "remote"),
            ("SCOREQ_SUBMISSION_URL", "https://compute.example.com/runs"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SCOREQ_CONTAINER")));
    }

    #[test]
    fn test_rejects_unknown_mode_and_bad_numbers() {
        assert!(RunnerConfig::from_lookup(lookup_from(&[("SCOREQ_MODE", "cluster")])).is_err());
        assert!(
            RunnerConfig::from_lookup(lookup_from(&[("SCOREQ_POLL_CEILING", "lots")])).is_err()
        );
        assert!(RunnerConfig::from_lookup(lookup_from(&[("SCOREQ_POLL_CEILING", "0")])).is_err());
    }

    #[test]
    fn test_requeue_policy() {
        let config = RunnerConfig::from_lookup(lookup_from(&[(
            "SCOREQ_QUERY_FAILURE_POLICY",
            "requeue",
        )]))
        .unwrap();
        assert_eq!(config.query_failure_policy, QueryFailurePolicy::Requeue);
    }

    #[test]
    fn test_mode_serializes_tagged() {
        let json = serde_json::to_value(RunnerConfig::remote("http://svc/runs", "c").mode).unwrap();
        assert_eq!(json["mode"], "remote");
        assert_eq!(json["container"], "c");
    }
}
