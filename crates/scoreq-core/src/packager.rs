//! Job packaging: turns a submission and its phase into something an
//! execution backend can run.
//!
//! - [`LocalPackager`] materialises an unpacked job directory:
//!   `program/`, `input/ref/`, `input/res/` and an empty `output/`.
//! - [`RemotePackager`] writes small descriptor artifacts that point the
//!   remote computation service at the stored bundles.

use std::fs;
use std::path::{Path, PathBuf};

use scoreq_state::{ArtifactName, ArtifactStore, Phase, Submission};
use tracing::{debug, info};

use crate::archive::extract_archive;
use crate::error::PackagingError;
use crate::manifest::{resolve_executable, MANIFEST_FILE};

/// An unpacked job ready for the local runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalJob {
    pub job_dir: PathBuf,
    pub program_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Absolute path of the scoring program's entry point
    pub executable: PathBuf,
}

impl LocalJob {
    fn layout(job_dir: PathBuf) -> Self {
        LocalJob {
            program_dir: job_dir.join("program"),
            input_dir: job_dir.join("input"),
            output_dir: job_dir.join("output"),
            executable: PathBuf::new(),
            job_dir,
        }
    }

    pub fn reference_dir(&self) -> PathBuf {
        self.input_dir.join("ref")
    }

    pub fn submission_dir(&self) -> PathBuf {
        self.input_dir.join("res")
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.output_dir.join("stdout.txt")
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.output_dir.join("stderr.txt")
    }
}

/// Packages jobs as directories below a work root.
#[derive(Debug, Clone)]
pub struct LocalPackager {
    work_root: PathBuf,
}

impl LocalPackager {
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        LocalPackager {
            work_root: work_root.into(),
        }
    }

    /// Job directory for a submission. One directory per submission; a new
    /// packaging run replaces whatever a previous run left behind.
    pub fn job_dir(&self, submission: &Submission) -> PathBuf {
        self.work_root.join(submission.artifact_root().as_str())
    }

    /// Build the job directory for `submission` and resolve its executable.
    pub async fn package(
        &self,
        artifacts: &dyn ArtifactStore,
        submission: &Submission,
        phase: &Phase,
    ) -> Result<LocalJob, PackagingError> {
        let mut job = LocalJob::layout(self.job_dir(submission));
        info!(submission_id = %submission.id, job_dir = ?job.job_dir, "Packaging local job");

        if job.job_dir.exists() {
            debug!(job_dir = ?job.job_dir, "Job directory already exists, clearing it out");
            fs::remove_dir_all(&job.job_dir)?;
        }
        for dir in [
            job.program_dir.clone(),
            job.reference_dir(),
            job.submission_dir(),
            job.output_dir.clone(),
        ] {
            fs::create_dir_all(&dir)?;
        }

        unpack(artifacts, &phase.scoring_program, &job.program_dir).await?;
        unpack(artifacts, &phase.reference_data, &job.reference_dir()).await?;
        unpack(artifacts, &submission.payload, &job.submission_dir()).await?;

        let manifest_path = job.program_dir.join(MANIFEST_FILE);
        let manifest = fs::read_to_string(&manifest_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PackagingError::ManifestMissing {
                    path: manifest_path.display().to_string(),
                }
            } else {
                PackagingError::Io(e)
            }
        })?;

        let executable = job.program_dir.join(resolve_executable(&manifest)?);
        if !executable.is_file() {
            return Err(PackagingError::MissingExecutable {
                path: executable.display().to_string(),
            });
        }
        debug!(executable = ?executable, "Resolved scoring program entry point");
        job.executable = executable;

        Ok(job)
    }
}

async fn unpack(
    artifacts: &dyn ArtifactStore,
    name: &ArtifactName,
    dest: &Path,
) -> Result<(), PackagingError> {
    let bytes = artifacts.read(name).await?;
    extract_archive(&bytes, dest).map_err(|source| PackagingError::Archive {
        artifact: name.to_string(),
        source,
    })
}

/// Descriptors handed to the remote computation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJob {
    pub input_descriptor: ArtifactName,
    pub run_descriptor: ArtifactName,
    pub stdout_placeholder: ArtifactName,
}

/// Packages jobs as descriptor artifacts; nothing is unpacked locally.
#[derive(Debug, Clone, Default)]
pub struct RemotePackager;

impl RemotePackager {
    pub fn new() -> Self {
        RemotePackager
    }

    /// Input descriptor: reference data and submission payload.
    pub fn input_descriptor(phase: &Phase, submission: &Submission) -> String {
        format!(
            "ref: {}\nres: {}\n",
            phase.reference_data, submission.payload
        )
    }

    /// Run descriptor: binds the input descriptor to the scoring program.
    pub fn run_descriptor(phase: &Phase, input_descriptor: &ArtifactName) -> String {
        format!(
            "program: {}\ninput: {}\n",
            phase.scoring_program, input_descriptor
        )
    }

    /// Initial stdout contents, before the service appends to it.
    pub fn stdout_placeholder(submission: &Submission) -> String {
        format!(
            "Standard output file for submission #{}:\n\n",
            submission.submission_number
        )
    }

    /// Write the descriptor artifacts and record their names on the
    /// submission. The caller persists the submission.
    pub async fn package(
        &self,
        artifacts: &dyn ArtifactStore,
        submission: &mut Submission,
        phase: &Phase,
    ) -> Result<RemoteJob, PackagingError> {
        let input_descriptor = submission.input_descriptor_name();
        artifacts
            .write(
                &input_descriptor,
                Self::input_descriptor(phase, submission).as_bytes(),
            )
            .await?;

        let run_descriptor = submission.run_descriptor_name();
        artifacts
            .write(
                &run_descriptor,
                Self::run_descriptor(phase, &input_descriptor).as_bytes(),
            )
            .await?;

        let stdout_placeholder = submission.stdout_name();
        artifacts
            .write(
                &stdout_placeholder,
                Self::stdout_placeholder(submission).as_bytes(),
            )
            .await?;

        submission.input_file = Some(input_descriptor.clone());
        submission.run_file = Some(run_descriptor.clone());
        submission.stdout_file = Some(stdout_placeholder.clone());
        debug!(submission_id = %submission.id, run = %run_descriptor, "Wrote run descriptors");

        Ok(RemoteJob {
            input_descriptor,
            run_descriptor,
            stdout_placeholder,
        })
    }
}
