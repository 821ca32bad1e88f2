//! Piecewise-linear score ramps

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};

/// Linear interpolation of `x` over `range`, mapped onto `scores`
pub fn linear_score(range: (f64, f64), scores: (f64, f64), x: f64) -> f64 {
    let slope = (scores.1 - scores.0) / (range.1 - range.0);
    slope * (x - range.0) + scores.0
}

/// One band `[lo, hi)` mapped linearly onto `[score_lo, score_hi)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub lo: f64,
    pub hi: f64,
    pub score_lo: f64,
    pub score_hi: f64,
}

impl Segment {
    fn eval(&self, x: f64) -> f64 {
        linear_score((self.lo, self.hi), (self.score_lo, self.score_hi), x)
    }
}

/// Maps a metric to a score.
///
/// Values at or above `ceiling` get `ceiling_score`. Below it, bands are
/// tried from the highest lower bound down; the first band whose `lo` is not
/// above `x` interpolates. Values under every band yield `None`, which
/// callers render as "needs manual review" or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub ceiling: f64,
    pub ceiling_score: f64,
    segments: Vec<Segment>,
}

impl Ramp {
    pub fn new(ceiling: f64, ceiling_score: f64) -> Self {
        Self {
            ceiling,
            ceiling_score,
            segments: Vec::new(),
        }
    }

    /// Add a band; bands may be added in any order
    pub fn band(mut self, lo: f64, hi: f64, score_lo: f64, score_hi: f64) -> Self {
        self.segments.push(Segment {
            lo,
            hi,
            score_lo,
            score_hi,
        });
        self.segments.sort_by(|a, b| b.lo.total_cmp(&a.lo));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Lowest value that still earns a score
    pub fn floor(&self) -> f64 {
        self.segments.last().map_or(self.ceiling, |s| s.lo)
    }

    /// Reject non-finite numbers and empty bands
    pub fn validate(&self) -> GradeResult<()> {
        if !self.ceiling.is_finite() || !self.ceiling_score.is_finite() {
            return Err(GradeError::Config(format!(
                "Ramp ceiling {} -> {} must be finite",
                self.ceiling, self.ceiling_score
            )));
        }
        for s in &self.segments {
            let finite = [s.lo, s.hi, s.score_lo, s.score_hi]
                .iter()
                .all(|v| v.is_finite());
            if !finite || s.lo >= s.hi {
                return Err(GradeError::Config(format!(
                    "Ramp band [{}, {}) -> [{}, {}) is invalid",
                    s.lo, s.hi, s.score_lo, s.score_hi
                )));
            }
        }
        Ok(())
    }

    pub fn score(&self, x: f64) -> Option<f64> {
        if x >= self.ceiling {
            return Some(self.ceiling_score);
        }
        self.segments
            .iter()
            .find(|segment| x >= segment.lo)
            .map(|segment| segment.eval(x))
    }

    /// Accuracy percentage ramp of the community-detection assignment
    pub fn clustering_accuracy() -> Self {
        Self::new(70.0, 100.0)
            .band(60.0, 70.0, 90.0, 100.0)
            .band(50.0, 60.0, 80.0, 90.0)
            .band(20.0, 50.0, 60.0, 80.0)
    }

    /// AUC ramp of the link-prediction assignment
    pub fn link_prediction_auc() -> Self {
        Self::new(0.93, 60.0)
            .band(0.85, 0.93, 50.0, 60.0)
            .band(0.75, 0.85, 40.0, 50.0)
            .band(0.65, 0.75, 20.0, 40.0)
    }
}
