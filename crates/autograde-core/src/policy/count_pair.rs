//! Weighted sum of two pass counts printed as `uniform,biased`

use serde::{Deserialize, Serialize};

use super::GradingPolicy;
use crate::error::{GradeError, GradeResult};
use crate::record::{CountPairRecord, GradeRecord, ResultRecord};
use crate::runner::Completed;
use crate::sandbox::Sandbox;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountPairParams {
    #[serde(default = "default_uniform_weight")]
    pub uniform_weight: i64,
    #[serde(default = "default_biased_weight")]
    pub biased_weight: i64,
}

fn default_uniform_weight() -> i64 {
    3
}

fn default_biased_weight() -> i64 {
    1
}

impl Default for CountPairParams {
    fn default() -> Self {
        Self {
            uniform_weight: default_uniform_weight(),
            biased_weight: default_biased_weight(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountPairPolicy {
    params: CountPairParams,
}

impl CountPairPolicy {
    pub fn new(params: CountPairParams) -> Self {
        Self { params }
    }

    /// `uniform_weight * uniform + biased_weight * biased`; `None` on overflow
    fn weighted_sum(&self, uniform: i64, biased: i64) -> Option<i64> {
        let uniform = self.params.uniform_weight.checked_mul(uniform)?;
        let biased = self.params.biased_weight.checked_mul(biased)?;
        uniform.checked_add(biased)
    }

    fn parse_counts(stdout: &str, sandbox: &Sandbox) -> GradeResult<(i64, i64)> {
        let mut fields = stdout.split(',').map(str::trim);
        let mut next = |which: &str| {
            let field = fields.next().unwrap_or_default();
            field.parse::<i64>().map_err(|_| {
                GradeError::malformed(
                    sandbox.root(),
                    format!("{} count {:?} is not an integer", which, field),
                )
            })
        };
        let uniform = next("uniform")?;
        let biased = next("biased")?;
        Ok((uniform, biased))
    }
}

impl GradingPolicy for CountPairPolicy {
    type Record = CountPairRecord;

    fn name(&self) -> &'static str {
        "count_pair"
    }

    fn interpret(&self, sandbox: &Sandbox, outcome: &Completed) -> GradeResult<CountPairRecord> {
        // Anything on stderr means the driver crashed or complained
        if let Some(stderr) = outcome.stderr_text().filter(|s| !s.is_empty()) {
            return Ok(CountPairRecord::from_base(GradeRecord::new(None, Some(stderr))));
        }

        let stdout = match outcome.stdout_text().filter(|s| !s.is_empty()) {
            Some(stdout) => stdout,
            None => {
                return Ok(CountPairRecord::from_base(GradeRecord::new(
                    None,
                    Some("No output".to_string()),
                )));
            }
        };

        let (uniform, biased) = Self::parse_counts(&stdout, sandbox)?;
        let score = self.weighted_sum(uniform, biased).ok_or_else(|| {
            GradeError::malformed(
                sandbox.root(),
                format!("counts {},{} overflow the weighted score", uniform, biased),
            )
        })?;
        Ok(CountPairRecord {
            base: GradeRecord::scored(score as f64),
            score_uniform: Some(uniform),
            score_biased: Some(biased),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome(stdout: &str, stderr: &str) -> Completed {
        Completed {
            status: Some(0),
            stdout: Some(stdout.as_bytes().to_vec()),
            stderr: Some(stderr.as_bytes().to_vec()),
            ..Default::default()
        }
    }

    fn interpret(completed: &Completed) -> GradeResult<CountPairRecord> {
        let temp_dir = TempDir::new().unwrap();
        CountPairPolicy::default().interpret(&Sandbox::at_path(temp_dir.path()), completed)
    }

    #[test]
    fn test_weighted_sum_of_counts() {
        let record = interpret(&outcome("4,2\n", "")).unwrap();
        assert_eq!(record.score(), Some(14.0));
        assert_eq!(record.score_uniform, Some(4));
        assert_eq!(record.score_biased, Some(2));
        assert_eq!(record.message(), None);
    }

    #[test]
    fn test_stderr_wins_over_stdout() {
        let record = interpret(&outcome("5,5", "Traceback: boom\n")).unwrap();
        assert_eq!(record.score(), None);
        assert_eq!(record.message(), Some("Traceback: boom\n"));
        assert_eq!(record.score_uniform, None);
    }

    #[test]
    fn test_empty_stdout_is_no_output() {
        let record = interpret(&outcome("", "")).unwrap();
        assert_eq!(record.score(), None);
        assert_eq!(record.message(), Some("No output"));

        let record = interpret(&Completed::default()).unwrap();
        assert_eq!(record.message(), Some("No output"));
    }

    #[test]
    fn test_garbled_counts_are_malformed() {
        let err = interpret(&outcome("five,2", "")).unwrap_err();
        assert!(err.to_string().contains("uniform count"));

        let err = interpret(&outcome("7", "")).unwrap_err();
        assert!(err.to_string().contains("biased count"));
    }

    #[test]
    fn test_huge_counts_are_malformed_not_wrapped() {
        // 3 * 3074457345618258603 exceeds i64::MAX
        let err = interpret(&outcome("3074457345618258603,0", "")).unwrap_err();
        assert!(matches!(err, GradeError::MalformedArtifact { .. }));
        assert!(err.to_string().contains("overflow"));

        let err = interpret(&outcome("1,9223372036854775807", "")).unwrap_err();
        assert!(matches!(err, GradeError::MalformedArtifact { .. }));

        let record = interpret(&outcome("-2,5", "")).unwrap();
        assert_eq!(record.score(), Some(-1.0));
    }
}
