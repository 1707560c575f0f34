//! Local subprocess backend.

use std::fs::File;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::ExecutionError;
use crate::packager::LocalJob;

/// Result of a local job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRunResult {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

impl LocalRunResult {
    /// Whether this run passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Runs an unpacked job as `<executable> <input dir> <output dir>`, with
/// stdout and stderr redirected into the output directory.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner {
    timeout_secs: u64,
}

impl LocalRunner {
    /// `timeout_secs == 0` disables the wall-clock limit.
    pub fn new(timeout_secs: u64) -> Self {
        LocalRunner { timeout_secs }
    }

    /// Execute the job and wait for it to exit.
    pub async fn run(&self, job: &LocalJob) -> Result<LocalRunResult, ExecutionError> {
        let start = Instant::now();
        let stdout = File::create(job.stdout_path())?;
        let stderr = File::create(job.stderr_path())?;

        info!(executable = ?job.executable, "Running scoring program");
        let mut child = Command::new(&job.executable)
            .arg(&job.input_dir)
            .arg(&job.output_dir)
            .current_dir(&job.program_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                executable: job.executable.display().to_string(),
                source,
            })?;

        let status = if self.timeout_secs > 0 {
            match tokio::time::timeout(Duration::from_secs(self.timeout_secs), child.wait()).await
            {
                Ok(status) => status?,
                Err(_) => {
                    warn!(timeout_secs = self.timeout_secs, "Scoring program timed out, killing it");
                    child.kill().await?;
                    return Err(ExecutionError::TimedOut {
                        timeout_secs: self.timeout_secs,
                    });
                }
            }
        } else {
            child.wait().await?
        };

        let result = LocalRunResult {
            exit_code: status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
            success: status.success(),
        };
        info!(
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "Scoring program exited"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    #[cfg(unix)]
    fn job_with_script(root: &Path, script: &str) -> LocalJob {
        use std::os::unix::fs::PermissionsExt;

        let program_dir = root.join("program");
        let input_dir = root.join("input");
        let output_dir = root.join("output");
        for dir in [&program_dir, &input_dir, &output_dir] {
            fs::create_dir_all(dir).unwrap();
        }
        let executable = program_dir.join("run.sh");
        fs::write(&executable, script).unwrap();
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();

        LocalJob {
            job_dir: root.to_path_buf(),
            program_dir,
            input_dir,
            output_dir,
            executable,
        }
    }

    #[test]
    fn test_run_result_passed() {
        let result = LocalRunResult {
            exit_code: 0,
            duration_ms: 10,
            success: true,
        };
        assert!(result.passed());
    }

    #[test]
    fn test_run_result_failed() {
        let result = LocalRunResult {
            exit_code: 2,
            duration_ms: 10,
            success: false,
        };
        assert!(!result.passed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_and_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_with_script(
            dir.path(),
            "#!/bin/sh\necho \"in=$1\"\necho oops >&2\necho 'accuracy: 1.0' > \"$2/scores.txt\"\n",
        );

        let result = LocalRunner::new(0).run(&job).await.unwrap();
        assert!(result.passed());

        let stdout = fs::read_to_string(job.stdout_path()).unwrap();
        assert!(stdout.contains(&format!("in={}", job.input_dir.display())));
        assert_eq!(fs::read_to_string(job.stderr_path()).unwrap(), "oops\n");
        assert!(job.output_dir.join("scores.txt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_with_script(dir.path(), "#!/bin/sh\nexit 3\n");

        let result = LocalRunner::new(0).run(&job).await.unwrap();
        assert!(!result.passed());
        assert_eq!(result.exit_code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_program() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_with_script(dir.path(), "#!/bin/sh\nsleep 30\n");

        let err = LocalRunner::new(1).run(&job).await.unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut { timeout_secs: 1 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_executable_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_with_script(dir.path(), "#!/bin/sh\n");
        job.executable = job.program_dir.join("does-not-exist");

        let err = LocalRunner::new(0).run(&job).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
    }
}
