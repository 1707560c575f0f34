//! SCOREQ lifecycle core
//!
//! Packages competition submissions, dispatches them to a local or remote
//! execution backend, polls remote runs to completion and ingests the
//! resulting scores.

pub mod archive;
pub mod backend;
pub mod config;
pub mod error;
pub mod fakes;
pub mod ingest;
pub mod lifecycle;
pub mod manifest;
pub mod packager;
pub mod scheduler;
pub mod tasks;
pub mod telemetry;
pub mod worker;

pub use backend::{
    ComputationService, ExecutionBackend, ExecutionHandle, ExecutionStatus,
    HttpComputationService, LocalRunResult, LocalRunner, StatusReport,
};
pub use config::{ExecutionMode, QueryFailurePolicy, RunnerConfig};
pub use error::{
    ArchiveError, ConfigError, DispatchError, ExecutionError, IngestionError, InvalidTransition,
    PackagingError, Result, RunnerError,
};
pub use ingest::{parse_scores, IngestReport};
pub use lifecycle::{transition, LifecycleEvent};
pub use packager::{LocalJob, LocalPackager, RemoteJob, RemotePackager};
pub use scheduler::{Task, TaskQueue, TaskScheduler};
pub use tasks::{DispatchOutcome, Handled, Lifecycle, PollOutcome, Stores};
pub use telemetry::init_tracing;
pub use worker::Worker;
