//! Score parsed from a unit-test runner's summary output

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::GradingPolicy;
use crate::error::{GradeError, GradeResult};
use crate::record::GradeRecord;
use crate::runner::Completed;
use crate::sandbox::Sandbox;

/// Which captured stream holds the test report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    /// The Python unittest runner reports on stderr
    #[default]
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTestLogParams {
    #[serde(default)]
    pub stream: OutputStream,

    /// Substring that marks an all-green run
    #[serde(default = "default_success_marker")]
    pub success_marker: String,

    /// Prefix of the line that closes the progress block
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Character printed once per passing check
    #[serde(default = "default_count_marker")]
    pub count_marker: char,

    #[serde(default = "default_expected_checks")]
    pub expected_checks: u32,

    #[serde(default = "default_full_score")]
    pub full_score: f64,
}

fn default_success_marker() -> String {
    "OK".to_string()
}

fn default_separator() -> String {
    "========".to_string()
}

fn default_count_marker() -> char {
    '.'
}

fn default_expected_checks() -> u32 {
    10
}

fn default_full_score() -> f64 {
    20.0
}

impl Default for UnitTestLogParams {
    fn default() -> Self {
        Self {
            stream: OutputStream::default(),
            success_marker: default_success_marker(),
            separator: default_separator(),
            count_marker: default_count_marker(),
            expected_checks: default_expected_checks(),
            full_score: default_full_score(),
        }
    }
}

impl UnitTestLogParams {
    /// Reject settings that cannot produce a finite score
    pub fn validate(&self) -> GradeResult<()> {
        if self.expected_checks == 0 {
            return Err(GradeError::Config(
                "unit_test_log expected_checks must be at least 1".to_string(),
            ));
        }
        if !self.full_score.is_finite() {
            return Err(GradeError::Config(format!(
                "unit_test_log full_score {} must be finite",
                self.full_score
            )));
        }
        if self.separator.is_empty() {
            return Err(GradeError::Config(
                "unit_test_log separator is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Grades a locked test driver by reading its report
#[derive(Debug, Clone, Default)]
pub struct UnitTestLogPolicy {
    params: UnitTestLogParams,
}

impl UnitTestLogPolicy {
    pub fn new(params: UnitTestLogParams) -> Self {
        Self { params }
    }

    /// Score one report. The full score is awarded when the success marker
    /// appears anywhere; otherwise the line directly above the first
    /// separator line is the progress line and its markers are counted.
    pub fn grade_report(&self, report: &str, origin: &Path) -> GradeResult<GradeRecord> {
        let params = &self.params;
        params.validate()?;
        if report.contains(&params.success_marker) {
            return Ok(GradeRecord::scored(params.full_score));
        }

        let lines: Vec<&str> = report.split('\n').collect();
        let separator_at = lines
            .iter()
            .position(|line| line.starts_with(&params.separator))
            .ok_or_else(|| {
                GradeError::malformed(origin, format!("no {:?} separator in test report", params.separator))
            })?;
        if separator_at == 0 {
            return Err(GradeError::malformed(
                origin,
                "test report starts with the separator",
            ));
        }

        let passed = lines[separator_at - 1]
            .chars()
            .filter(|c| *c == params.count_marker)
            .count();
        let per_check = params.full_score / f64::from(params.expected_checks);
        Ok(GradeRecord::scored(passed as f64 * per_check))
    }
}

impl GradingPolicy for UnitTestLogPolicy {
    type Record = GradeRecord;

    fn name(&self) -> &'static str {
        "unit_test_log"
    }

    fn interpret(&self, sandbox: &Sandbox, outcome: &Completed) -> GradeResult<GradeRecord> {
        let report = match self.params.stream {
            OutputStream::Stdout => outcome.stdout_text(),
            OutputStream::Stderr => outcome.stderr_text(),
        };
        match report {
            Some(report) => self.grade_report(&report, sandbox.root()),
            None => Ok(GradeRecord::new(None, Some("No output".to_string()))),
        }
    }
}
