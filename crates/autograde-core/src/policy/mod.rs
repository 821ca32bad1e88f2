//! Scoring policies
//!
//! A policy is the assignment-specific strategy plugged into the generic
//! batch runner. It may prepare the sandbox beyond the configured fixtures,
//! interpret the outcome of an executed command, or inspect a located
//! artifact without running anything. A policy implements whichever of the
//! two grading procedures its assignment needs; the other one reports
//! [`GradeError::Unsupported`].

mod auc;
mod clustering;
mod count_pair;
mod ramp;
mod unit_test_log;

pub use auc::{AucParams, AucPolicy, roc_auc};
pub use clustering::{Alignment, ClusteringParams, ClusteringPolicy, best_alignment};
pub use count_pair::{CountPairParams, CountPairPolicy};
pub use ramp::{Ramp, Segment, linear_score};
pub use unit_test_log::{OutputStream, UnitTestLogParams, UnitTestLogPolicy};

use std::path::Path;
use std::time::Duration;

use crate::error::{GradeError, GradeResult};
use crate::record::ResultRecord;
use crate::runner::Completed;
use crate::sandbox::Sandbox;

/// Assignment-specific grading strategy
pub trait GradingPolicy: Send + Sync {
    /// Record schema produced by this policy
    type Record: ResultRecord;

    /// Short identifier used in logs and errors
    fn name(&self) -> &'static str;

    /// Extra sandbox preparation, run after configured fixtures are injected
    fn prepare_sandbox(&self, _sandbox: &Sandbox) -> GradeResult<()> {
        Ok(())
    }

    /// Map a finished command to a record
    fn interpret(&self, _sandbox: &Sandbox, _outcome: &Completed) -> GradeResult<Self::Record> {
        Err(GradeError::Unsupported {
            policy: self.name(),
            procedure: "execute",
        })
    }

    /// Map a timed-out command to a record
    fn on_timeout(&self, after: Duration) -> Self::Record {
        tracing::debug!(policy = self.name(), "Scoring timeout after {:?} as zero", after);
        Self::Record::timed_out()
    }

    /// Grade a located artifact in-process
    fn inspect(&self, _artifact: &Path) -> GradeResult<Self::Record> {
        Err(GradeError::Unsupported {
            policy: self.name(),
            procedure: "inspect",
        })
    }
}
