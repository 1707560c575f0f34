//! SCOREQ command-line harness
//!
//! ## Commands
//!
//! - `evaluate`: run a scoring program against a submission locally and
//!   print the recorded scores
//! - `submit`: post a run descriptor to a remote computation service
//! - `status`: query a remote run by execution handle

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scoreq_core::config::DEFAULT_HTTP_TIMEOUT_SECS;
use scoreq_core::{
    ComputationService, ConfigError, ExecutionHandle, HttpComputationService, Lifecycle,
    RunnerConfig, Stores, Task, Worker,
};
use scoreq_state::fakes::{MemoryArtifactStore, MemoryScoreStore, MemorySubmissionStore};
use scoreq_state::{
    ArtifactName, ArtifactStore, CompetitionId, Phase, PhaseId, ScoreDefinition, ScoreStore,
    Submission, SubmissionId, SubmissionStore,
};
use serde_json::json;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "scoreq")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scored submission lifecycle runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and JSON results
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a submission locally with a scoring program bundle
    Evaluate {
        /// Scoring program archive (zip with a `metadata` manifest)
        #[arg(long)]
        program: PathBuf,

        /// Reference data archive
        #[arg(long)]
        reference: PathBuf,

        /// Submission archive
        #[arg(long)]
        submission: PathBuf,

        /// Score label to record (repeatable)
        #[arg(long = "score", required = true)]
        scores: Vec<String>,

        /// Job directory root (default: a temporary directory)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Wall-clock limit for the scoring program, 0 for none
        #[arg(long, default_value = "0", env = "SCOREQ_LOCAL_TIMEOUT_SECS")]
        timeout_secs: u64,
    },

    /// Dispatch a run descriptor to a computation service
    Submit {
        /// Submission endpoint
        #[arg(long, env = "SCOREQ_SUBMISSION_URL")]
        url: String,

        /// Storage container the service reads from
        #[arg(long, env = "SCOREQ_CONTAINER")]
        container: String,

        /// Run descriptor artifact name
        #[arg(long)]
        run_id: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS, env = "SCOREQ_HTTP_TIMEOUT_SECS")]
        http_timeout_secs: u64,
    },

    /// Query the status of a dispatched run
    Status {
        /// Status endpoint; the handle is appended as a path segment
        #[arg(long, env = "SCOREQ_STATUS_URL")]
        url: String,

        /// Execution handle returned by `submit`
        handle: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS, env = "SCOREQ_HTTP_TIMEOUT_SECS")]
        http_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    scoreq_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Evaluate {
            program,
            reference,
            submission,
            scores,
            work_dir,
            timeout_secs,
        } => {
            let bundles = Bundles {
                program,
                reference,
                submission,
            };
            cmd_evaluate(&bundles, &scores, work_dir, timeout_secs, cli.json).await
        }
        Commands::Submit {
            url,
            container,
            run_id,
            http_timeout_secs,
        } => cmd_submit(&url, &container, &run_id, http_timeout_secs, cli.json).await,
        Commands::Status {
            url,
            handle,
            http_timeout_secs,
        } => cmd_status(&url, &handle, http_timeout_secs, cli.json).await,
    }
}

struct Bundles {
    program: PathBuf,
    reference: PathBuf,
    submission: PathBuf,
}

const PHASE: PhaseId = PhaseId(1);
const COMPETITION: CompetitionId = CompetitionId(1);
const SUBMISSION: SubmissionId = SubmissionId(1);

/// Run the local lifecycle against in-memory stores seeded from disk.
async fn cmd_evaluate(
    bundles: &Bundles,
    score_keys: &[String],
    work_dir: Option<PathBuf>,
    timeout_secs: u64,
    json: bool,
) -> Result<()> {
    // Holds the temporary job root until the command returns.
    let scratch;
    let work_root = match work_dir {
        Some(dir) => dir,
        None => {
            scratch = tempfile::tempdir().context("Failed to create work directory")?;
            scratch.path().to_path_buf()
        }
    };

    let submissions = Arc::new(MemorySubmissionStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let scores = Arc::new(MemoryScoreStore::new());

    let phase = Phase {
        id: PHASE,
        competition_id: COMPETITION,
        scoring_program: ArtifactName::new("phases/1/program.zip"),
        reference_data: ArtifactName::new("phases/1/reference.zip"),
    };
    let submission = Submission::new(SUBMISSION, PHASE, "uploads/1.zip", 1);
    let stderr_name = submission.stderr_name();

    seed(artifacts.as_ref(), &phase.scoring_program, &bundles.program).await?;
    seed(artifacts.as_ref(), &phase.reference_data, &bundles.reference).await?;
    seed(artifacts.as_ref(), &submission.payload, &bundles.submission).await?;
    for (id, key) in score_keys.iter().enumerate() {
        scores.insert_definition(ScoreDefinition::new(id as u64 + 1, COMPETITION, key));
    }
    submissions.insert_phase(phase);
    submissions.insert_submission(submission);

    let config = evaluate_config(&work_root, timeout_secs, |key| std::env::var(key).ok())?;
    let stores = Stores {
        submissions: submissions.clone(),
        artifacts: artifacts.clone(),
        scores: scores.clone(),
    };
    let lifecycle = Lifecycle::from_config(stores, config)?;

    info!(work_root = ?work_root, "Evaluating submission");
    let outcome = Worker::run_to_completion(
        Arc::new(lifecycle),
        Task::Dispatch {
            submission_id: SUBMISSION,
        },
    )
    .await;

    let final_status = submissions.get_submission(SUBMISSION).await?.status;
    let report = outcome.context("Evaluation failed")?;
    let records = scores.scores_for(SUBMISSION).await?;
    let stderr = artifacts.read(&stderr_name).await.ok();

    if json {
        let output = json!({
            "status": final_status,
            "report": report,
            "scores": records
                .iter()
                .map(|r| json!({"key": r.key, "value": r.value}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Status: {}", final_status);
        match report {
            Some(report) => {
                println!(
                    "Recorded {} score(s), {} unknown label(s), {} malformed line(s)",
                    report.recorded, report.skipped, report.malformed
                );
                for record in &records {
                    println!("  {:<20} {}", record.key, record.value);
                }
            }
            None => {
                println!("Scoring program failed; no scores recorded");
                if let Some(stderr) = stderr.filter(|s| !s.is_empty()) {
                    println!();
                    println!("{}", String::from_utf8_lossy(&stderr));
                }
            }
        }
    }

    if report.is_none() {
        bail!("scoring program exited unsuccessfully");
    }
    Ok(())
}

/// `SCOREQ_*` configuration for a local evaluation. The mode, job root and
/// timeout come from the command line; everything else from `lookup`.
fn evaluate_config<F>(
    work_root: &Path,
    timeout_secs: u64,
    lookup: F,
) -> std::result::Result<RunnerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    RunnerConfig::from_lookup(|key| match key {
        "SCOREQ_MODE" => Some("local".to_string()),
        "SCOREQ_WORK_ROOT" => Some(work_root.display().to_string()),
        "SCOREQ_LOCAL_TIMEOUT_SECS" => Some(timeout_secs.to_string()),
        other => lookup(other),
    })
}

async fn seed(artifacts: &dyn ArtifactStore, name: &ArtifactName, path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    artifacts.write(name, &bytes).await?;
    Ok(())
}

/// Post a dispatch request and print the handle.
async fn cmd_submit(
    url: &str,
    container: &str,
    run_id: &str,
    http_timeout_secs: u64,
    json: bool,
) -> Result<()> {
    let service = HttpComputationService::new(
        url,
        None,
        container,
        Duration::from_secs(http_timeout_secs),
    )?;
    let handle = service
        .submit(&ArtifactName::new(run_id))
        .await
        .context("Dispatch failed")?;

    if json {
        println!("{}", json!({ "handle": handle }));
    } else {
        println!("Submitted: {}", handle);
    }
    Ok(())
}

/// Query a run and print its status document.
async fn cmd_status(url: &str, handle: &str, http_timeout_secs: u64, json: bool) -> Result<()> {
    let service =
        HttpComputationService::new(url, Some(url), "", Duration::from_secs(http_timeout_secs))?;
    let handle = ExecutionHandle(handle.to_string());

    let Some(report) = service.query_status(&handle).await else {
        bail!("no status available for {}", handle);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report.raw)?);
    } else {
        println!("{}: {:?}", handle, report.status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_evaluate_requires_a_score_label() {
        let parsed = Cli::try_parse_from([
            "scoreq",
            "evaluate",
            "--program",
            "p.zip",
            "--reference",
            "r.zip",
            "--submission",
            "s.zip",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_evaluate_collects_repeated_scores() {
        let cli = Cli::try_parse_from([
            "scoreq",
            "--json",
            "evaluate",
            "--program",
            "p.zip",
            "--reference",
            "r.zip",
            "--submission",
            "s.zip",
            "--score",
            "accuracy",
            "--score",
            "f1",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Evaluate { scores, .. } => assert_eq!(scores, vec!["accuracy", "f1"]),
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_evaluate_config_keeps_env_settings_but_forces_local_mode() {
        let env = |key: &str| match key {
            "SCOREQ_MODE" => Some("remote".to_string()),
            "SCOREQ_WORK_ROOT" => Some("/elsewhere".to_string()),
            "SCOREQ_POLL_CEILING" => Some("7".to_string()),
            "SCOREQ_QUERY_FAILURE_POLICY" => Some("requeue".to_string()),
            _ => None,
        };

        let config = evaluate_config(Path::new("/jobs"), 30, env).unwrap();
        assert_eq!(
            config.mode,
            scoreq_core::ExecutionMode::Local {
                work_root: PathBuf::from("/jobs"),
                timeout_secs: 30,
            }
        );
        assert_eq!(config.poll_ceiling, 7);
        assert_eq!(
            config.query_failure_policy,
            scoreq_core::QueryFailurePolicy::Requeue
        );
    }

    #[test]
    fn test_evaluate_config_rejects_invalid_env() {
        let env = |key: &str| (key == "SCOREQ_POLL_CEILING").then(|| "lots".to_string());
        assert!(evaluate_config(Path::new("/jobs"), 0, env).is_err());
    }
}
