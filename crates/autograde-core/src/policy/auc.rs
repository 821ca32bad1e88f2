//! AUC threshold score for link prediction

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{GradingPolicy, Ramp};
use crate::error::{GradeError, GradeResult};
use crate::locate::Anchor;
use crate::record::{AucRecord, GradeRecord};
use crate::runner::Completed;
use crate::sandbox::Sandbox;
use crate::truth::{GroundTruth, load_table};

/// Tunables of the AUC policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AucParams {
    /// Reference `id,label` file
    pub ground_truth: PathBuf,

    /// Prediction file the submission writes, searched in the sandbox
    #[serde(default = "default_prediction")]
    pub prediction: Anchor,

    #[serde(default = "Ramp::link_prediction_auc")]
    pub ramp: Ramp,
}

fn default_prediction() -> Anchor {
    Anchor::suffix("p3_prediction.csv")
}

impl AucParams {
    pub fn new(ground_truth: impl Into<PathBuf>) -> Self {
        Self {
            ground_truth: ground_truth.into(),
            prediction: default_prediction(),
            ramp: Ramp::link_prediction_auc(),
        }
    }

    pub fn validate(&self) -> GradeResult<()> {
        self.ramp.validate()
    }
}

/// Area under the ROC curve.
///
/// Uses the trapezoidal rule with tied scores forming one ROC step, which
/// equals the Mann-Whitney statistic with ties counted as one half. Returns
/// `None` when either class is absent.
pub fn roc_auc(scores: &[f64], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|p| **p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != positives.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (mut tp, mut fp) = (0usize, 0usize);
    let (mut prev_tp, mut prev_fp) = (0usize, 0usize);
    let mut area = 0.0;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]].total_cmp(&threshold) == Ordering::Equal {
            if positives[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        area += (fp - prev_fp) as f64 * (tp + prev_tp) as f64 / 2.0;
        prev_tp = tp;
        prev_fp = fp;
    }

    Some(area / (n_pos as f64 * n_neg as f64))
}

/// Link-prediction grader
pub struct AucPolicy {
    params: AucParams,
    truth: GroundTruth<f64>,
}

impl AucPolicy {
    pub fn load(params: AucParams) -> GradeResult<Self> {
        let truth = load_table(&params.ground_truth)?;
        tracing::info!("Loaded {} ground truth labels", truth.len());
        Ok(Self::with_truth(params, truth))
    }

    pub fn with_truth(params: AucParams, truth: GroundTruth<f64>) -> Self {
        Self { params, truth }
    }

    /// Score predictions for the dense id range `0..predictions.len()`
    pub fn grade_predictions(
        &self,
        predictions: &BTreeMap<i64, f64>,
        origin: &Path,
    ) -> GradeResult<AucRecord> {
        let mut scores = Vec::with_capacity(predictions.len());
        let mut positives = Vec::with_capacity(predictions.len());
        for id in 0..predictions.len() as i64 {
            let score = predictions
                .get(&id)
                .ok_or_else(|| GradeError::malformed(origin, format!("no prediction for id {}", id)))?;
            if score.is_nan() {
                return Err(GradeError::malformed(origin, format!("prediction for id {} is NaN", id)));
            }
            let label = self.truth.get(&id).ok_or_else(|| {
                GradeError::malformed(origin, format!("no ground truth for id {}", id))
            })?;
            scores.push(*score);
            positives.push(*label > 0.5);
        }

        let auc = roc_auc(&scores, &positives).ok_or_else(|| {
            GradeError::malformed(origin, "AUC undefined: labels cover a single class")
        })?;

        let record = match self.params.ramp.score(auc) {
            Some(score) => AucRecord {
                base: GradeRecord::scored(score),
                auc_score: Some(auc),
            },
            None => AucRecord {
                base: GradeRecord::new(Some(0.0), Some("AUC score too low".to_string())),
                auc_score: Some(auc),
            },
        };
        Ok(record)
    }
}

impl GradingPolicy for AucPolicy {
    type Record = AucRecord;

    fn name(&self) -> &'static str {
        "auc"
    }

    fn interpret(&self, sandbox: &Sandbox, _outcome: &Completed) -> GradeResult<AucRecord> {
        let artifact = self.params.prediction.locate(sandbox.root())?;
        self.inspect(&artifact)
    }

    fn inspect(&self, artifact: &Path) -> GradeResult<AucRecord> {
        let predictions: BTreeMap<i64, f64> = load_table(artifact)?;
        self.grade_predictions(&predictions, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResultRecord;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn policy(labels: &[f64]) -> AucPolicy {
        let truth = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (i as i64, *l))
            .collect();
        AucPolicy::with_truth(AucParams::new("unused.csv"), truth)
    }

    fn predictions(scores: &[f64]) -> BTreeMap<i64, f64> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| (i as i64, *s))
            .collect()
    }

    #[test]
    fn test_perfect_and_inverted_rankings() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels), Some(1.0));
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels), Some(0.0));
    }

    #[test]
    fn test_known_value_with_ties() {
        // Classic example: y = [0, 0, 1, 1], scores = [0.1, 0.4, 0.35, 0.8] -> 0.75
        let labels = [false, false, true, true];
        assert!(close(roc_auc(&[0.1, 0.4, 0.35, 0.8], &labels).unwrap(), 0.75));
        // All scores tied: the diagonal
        assert!(close(roc_auc(&[0.5; 4], &labels).unwrap(), 0.5));
        // A tie across classes counts one half
        assert!(close(roc_auc(&[0.1, 0.5, 0.5, 0.9], &labels).unwrap(), 0.875));
    }

    #[test]
    fn test_single_class_is_undefined() {
        assert_eq!(roc_auc(&[0.1, 0.2], &[true, true]), None);

        let err = policy(&[1.0, 1.0])
            .grade_predictions(&predictions(&[0.1, 0.2]), Path::new("p3.csv"))
            .unwrap_err();
        assert!(matches!(err, GradeError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_perfect_auc_scores_ceiling() {
        let record = policy(&[0.0, 0.0, 1.0, 1.0])
            .grade_predictions(&predictions(&[0.1, 0.2, 0.8, 0.9]), Path::new("p3.csv"))
            .unwrap();
        assert_eq!(record.score(), Some(60.0));
        assert_eq!(record.auc_score, Some(1.0));
    }

    #[test]
    fn test_low_auc_is_zero_but_recorded() {
        let record = policy(&[0.0, 0.0, 1.0, 1.0])
            .grade_predictions(&predictions(&[0.9, 0.8, 0.2, 0.1]), Path::new("p3.csv"))
            .unwrap();
        assert_eq!(record.score(), Some(0.0));
        assert_eq!(record.message(), Some("AUC score too low"));
        assert_eq!(record.auc_score, Some(0.0));
    }

    #[test]
    fn test_interpolated_auc_score() {
        // 5 positives x 2 negatives, 8 of the 10 pairs ordered correctly
        let labels = [0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let scores = [0.3, 0.6, 0.4, 0.5, 0.7, 0.8, 0.9];
        let record = policy(&labels)
            .grade_predictions(&predictions(&scores), Path::new("p3.csv"))
            .unwrap();
        assert!(close(record.auc_score.unwrap(), 0.8));
        assert!(close(record.score().unwrap(), 45.0));
    }

    #[test]
    fn test_sparse_ids_are_malformed() {
        let mut preds = predictions(&[0.1, 0.9]);
        preds.remove(&0);
        preds.insert(5, 0.3);
        let err = policy(&[0.0, 1.0])
            .grade_predictions(&preds, Path::new("p3.csv"))
            .unwrap_err();
        assert!(err.to_string().contains("no prediction for id 0"));
    }
}
