//! Sandboxed batch grading engine
//!
//! This crate grades a population of independently submitted code projects.
//! Each submission is staged into one reusable sandbox directory, a fixed
//! verification command is run against it (or a produced artifact is
//! inspected directly), and a pluggable scoring policy turns the outcome into
//! a result record. Failures are isolated per submission.
//!
//! # Features
//!
//! - **Sandbox lifecycle**: wipe, copy, inject reference fixtures
//! - **Execution driver**: argv or shell commands with a wall-clock budget
//!   that kills the whole process group
//! - **Scoring policies**: best-alignment clustering, AUC threshold,
//!   unit-test log parsing, weighted count pairs
//! - **Outputs**: CSV and JSON keyed by submission id, plus a batch log
//!
//! # Example
//!
//! ```rust,ignore
//! use autograde_core::{AssignmentConfig, BatchLog, BatchRunner, Harness, UnitTestLogPolicy};
//!
//! let config = AssignmentConfig::load("hw2p2-modularity.yaml")?;
//! let harness = Harness::new(config.sandbox(), config.grading_mode()?);
//! let runner = BatchRunner::new(UnitTestLogPolicy::default(), harness, BatchLog::inherit())
//!     .with_filters(config.filters());
//! let report = runner.run(&config.population_dir).await?;
//! ```
//!
//! Sequential reuse of the sandbox is the isolation guarantee: do not point
//! two concurrent runners at the same sandbox path.

pub mod config;
pub mod error;
pub mod locate;
pub mod logging;
pub mod policy;
pub mod record;
pub mod report;
pub mod runner;
pub mod sandbox;
pub mod truth;

// Re-exports for convenience
pub use config::{AssignmentConfig, ModeConfig, PolicyConfig};
pub use error::{GradeError, GradeResult};
pub use locate::{Anchor, MatchMode};
pub use logging::BatchLog;
pub use policy::{
    AucParams, AucPolicy, ClusteringParams, ClusteringPolicy, CountPairParams, CountPairPolicy,
    GradingPolicy, Ramp, UnitTestLogParams, UnitTestLogPolicy,
};
pub use record::{AucRecord, ClusteringRecord, CountPairRecord, GradeRecord, ResultRecord};
pub use report::{CsvReporter, JsonReporter, RunOutputs};
pub use runner::{
    BatchReport, BatchRunner, CommandSpec, Completed, ExecutionDriver, Filters, GradingMode,
    Harness, Outcome,
};
pub use sandbox::{Fixture, Sandbox};
