//! Grading runner components
//!
//! This module provides the execution infrastructure: the command driver,
//! the single-submission harness, and the batch orchestrator.

mod batch;
mod driver;
mod harness;

pub use batch::{BatchReport, BatchRunner, DEFAULT_IGNORE, Filters, enumerate_population};
pub use driver::{CommandSpec, Completed, ExecutionDriver, Invocation, Outcome};
pub use harness::{Graded, GradingMode, Harness};
