//! Concrete record types

use serde::{Deserialize, Serialize};

use super::ResultRecord;

/// Base record: a nullable score and a nullable diagnostic message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub score: Option<f64>,
    pub message: Option<String>,
}

impl GradeRecord {
    pub fn new(score: Option<f64>, message: Option<String>) -> Self {
        Self { score, message }
    }

    /// A score with no message
    pub fn scored(score: f64) -> Self {
        Self::new(Some(score), None)
    }
}

impl ResultRecord for GradeRecord {
    const EXTRA_FIELDS: &'static [&'static str] = &[];

    fn from_base(base: GradeRecord) -> Self {
        base
    }

    fn base(&self) -> &GradeRecord {
        self
    }
}

/// Result of the best-alignment clustering policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringRecord {
    #[serde(flatten)]
    pub base: GradeRecord,
    /// Best agreement fraction in `0..=1`
    pub accuracy: Option<f64>,
    /// Winning label permutation, e.g. `"2-0-1-4-3"`
    pub reindexer: Option<String>,
}

impl ResultRecord for ClusteringRecord {
    const EXTRA_FIELDS: &'static [&'static str] = &["accuracy", "reindexer"];

    fn from_base(base: GradeRecord) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    fn base(&self) -> &GradeRecord {
        &self.base
    }
}

/// Result of the AUC threshold policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AucRecord {
    #[serde(flatten)]
    pub base: GradeRecord,
    pub auc_score: Option<f64>,
}

impl ResultRecord for AucRecord {
    const EXTRA_FIELDS: &'static [&'static str] = &["auc_score"];

    fn from_base(base: GradeRecord) -> Self {
        Self {
            base,
            auc_score: None,
        }
    }

    fn base(&self) -> &GradeRecord {
        &self.base
    }
}

/// Result of the two-scenario count policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountPairRecord {
    #[serde(flatten)]
    pub base: GradeRecord,
    pub score_uniform: Option<i64>,
    pub score_biased: Option<i64>,
}

impl ResultRecord for CountPairRecord {
    const EXTRA_FIELDS: &'static [&'static str] = &["score_uniform", "score_biased"];

    fn from_base(base: GradeRecord) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    fn base(&self) -> &GradeRecord {
        &self.base
    }
}
