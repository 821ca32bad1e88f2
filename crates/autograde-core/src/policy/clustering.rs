//! Best-alignment clustering score
//!
//! Cluster ids produced by a submission are arbitrary, so agreement with the
//! reference categories is measured under the best relabeling. All `K!`
//! relabelings are searched in lexicographic order and the first maximum
//! wins. The search is factorial in `K`; assignments keep `K` small (5).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{GradingPolicy, Ramp};
use crate::error::{GradeError, GradeResult};
use crate::locate::Anchor;
use crate::record::{ClusteringRecord, GradeRecord};
use crate::runner::Completed;
use crate::sandbox::Sandbox;
use crate::truth::{GroundTruth, load_table};

/// Tunables of the clustering policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    /// Reference `id,category` file
    pub ground_truth: PathBuf,

    /// Prediction file the submission writes, searched in the sandbox
    #[serde(default = "default_prediction")]
    pub prediction: Anchor,

    /// Number of categories, `K`
    #[serde(default = "default_expected_clusters")]
    pub expected_clusters: usize,

    /// Exclusive upper bound on a cluster count still treated as
    /// over-segmentation
    #[serde(default = "default_over_segmentation_limit")]
    pub over_segmentation_limit: usize,

    /// Score for over-segmented predictions
    #[serde(default = "default_partial_score")]
    pub partial_score: f64,

    /// Multiplier applied to the ramp score
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Accuracy percentage to score
    #[serde(default = "Ramp::clustering_accuracy")]
    pub ramp: Ramp,
}

fn default_prediction() -> Anchor {
    Anchor::suffix("p2_prediction.csv")
}

fn default_expected_clusters() -> usize {
    5
}

fn default_over_segmentation_limit() -> usize {
    20
}

fn default_partial_score() -> f64 {
    36.0
}

fn default_weight() -> f64 {
    0.6
}

impl ClusteringParams {
    pub fn new(ground_truth: impl Into<PathBuf>) -> Self {
        Self {
            ground_truth: ground_truth.into(),
            prediction: default_prediction(),
            expected_clusters: default_expected_clusters(),
            over_segmentation_limit: default_over_segmentation_limit(),
            partial_score: default_partial_score(),
            weight: default_weight(),
            ramp: Ramp::clustering_accuracy(),
        }
    }

    /// Reject settings that cannot produce a finite score
    pub fn validate(&self) -> GradeResult<()> {
        if self.expected_clusters == 0 {
            return Err(GradeError::Config(
                "clustering expected_clusters must be at least 1".to_string(),
            ));
        }
        for (field, value) in [("weight", self.weight), ("partial_score", self.partial_score)] {
            if !value.is_finite() {
                return Err(GradeError::Config(format!(
                    "clustering {} {} must be finite",
                    field, value
                )));
            }
        }
        self.ramp.validate()
    }
}

/// Winning relabeling and the agreement it achieves
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// `permutation[predicted] == category`
    pub permutation: Vec<usize>,
    /// Agreement fraction in `0..=1`
    pub accuracy: f64,
}

impl Alignment {
    pub fn reindexer(&self) -> String {
        self.permutation
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Search every relabeling of `0..k` for the best agreement with `truth`.
///
/// Every ground-truth id must have a prediction in `0..k`. Ties keep the
/// lexicographically first permutation.
pub fn best_alignment(
    truth: &GroundTruth<i64>,
    predictions: &BTreeMap<i64, i64>,
    k: usize,
    origin: &Path,
) -> GradeResult<Alignment> {
    if truth.is_empty() {
        return Err(GradeError::malformed(origin, "ground truth is empty"));
    }

    // agreement[p][c]: items predicted p whose category is c
    let mut agreement = vec![vec![0usize; k]; k];
    for (id, category) in truth {
        let predicted = *predictions
            .get(id)
            .ok_or_else(|| GradeError::malformed(origin, format!("no prediction for id {}", id)))?;
        let predicted = usize::try_from(predicted)
            .ok()
            .filter(|p| *p < k)
            .ok_or_else(|| {
                GradeError::malformed(
                    origin,
                    format!("predicted label {} for id {} is outside 0..{}", predicted, id, k),
                )
            })?;
        if let Some(c) = usize::try_from(*category).ok().filter(|c| *c < k) {
            agreement[predicted][c] += 1;
        }
    }

    let mut permutation: Vec<usize> = (0..k).collect();
    let mut best_hits = hits(&agreement, &permutation);
    let mut best = permutation.clone();
    while next_permutation(&mut permutation) {
        let current = hits(&agreement, &permutation);
        if current > best_hits {
            best_hits = current;
            best = permutation.clone();
        }
    }

    Ok(Alignment {
        permutation: best,
        accuracy: best_hits as f64 / truth.len() as f64,
    })
}

fn hits(agreement: &[Vec<usize>], permutation: &[usize]) -> usize {
    permutation
        .iter()
        .enumerate()
        .map(|(predicted, &category)| agreement[predicted][category])
        .sum()
}

/// Advance to the next lexicographic permutation; false after the last one
fn next_permutation(items: &mut [usize]) -> bool {
    if items.len() < 2 {
        return false;
    }
    let Some(pivot) = (0..items.len() - 1).rev().find(|&i| items[i] < items[i + 1]) else {
        return false;
    };
    let successor = (pivot + 1..items.len())
        .rev()
        .find(|&j| items[j] > items[pivot])
        .unwrap_or(pivot + 1);
    items.swap(pivot, successor);
    items[pivot + 1..].reverse();
    true
}

/// Community-detection grader
pub struct ClusteringPolicy {
    params: ClusteringParams,
    truth: GroundTruth<i64>,
}

impl ClusteringPolicy {
    /// Load the ground truth named in `params`
    pub fn load(params: ClusteringParams) -> GradeResult<Self> {
        let truth = load_table(&params.ground_truth)?;
        tracing::info!("Loaded {} ground truth labels", truth.len());
        Ok(Self::with_truth(params, truth))
    }

    pub fn with_truth(params: ClusteringParams, truth: GroundTruth<i64>) -> Self {
        Self { params, truth }
    }

    /// Score a full prediction table
    pub fn grade_predictions(
        &self,
        predictions: &BTreeMap<i64, i64>,
        origin: &Path,
    ) -> GradeResult<ClusteringRecord> {
        let k = self.params.expected_clusters;
        let n_clusters = predictions.values().collect::<BTreeSet<_>>().len();

        if n_clusters != k {
            let base = if n_clusters > k && n_clusters < self.params.over_segmentation_limit {
                GradeRecord::new(
                    Some(self.params.partial_score),
                    Some(format!("#classes != {}: {}", k, n_clusters)),
                )
            } else {
                GradeRecord::new(
                    Some(0.0),
                    Some(format!("MANUAL. #classes != {}: {}", k, n_clusters)),
                )
            };
            return Ok(ClusteringRecord {
                base,
                ..Default::default()
            });
        }

        let alignment = best_alignment(&self.truth, predictions, k, origin)?;
        let percent = alignment.accuracy * 100.0;

        let Some(score) = self.params.ramp.score(percent) else {
            return Ok(ClusteringRecord {
                base: GradeRecord::new(
                    Some(0.0),
                    Some(format!(
                        "MANUAL: Accuracy {:?} < {}%",
                        percent,
                        self.params.ramp.floor()
                    )),
                ),
                ..Default::default()
            });
        };

        Ok(ClusteringRecord {
            base: GradeRecord::scored(score * self.params.weight),
            accuracy: Some(alignment.accuracy),
            reindexer: Some(alignment.reindexer()),
        })
    }
}

impl GradingPolicy for ClusteringPolicy {
    type Record = ClusteringRecord;

    fn name(&self) -> &'static str {
        "clustering"
    }

    fn interpret(&self, sandbox: &Sandbox, _outcome: &Completed) -> GradeResult<ClusteringRecord> {
        let artifact = self.params.prediction.locate(sandbox.root())?;
        self.inspect(&artifact)
    }

    fn inspect(&self, artifact: &Path) -> GradeResult<ClusteringRecord> {
        let predictions: BTreeMap<i64, i64> = load_table(artifact)?;
        self.grade_predictions(&predictions, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResultRecord;
    use tempfile::TempDir;

    fn table(pairs: &[(i64, i64)]) -> BTreeMap<i64, i64> {
        pairs.iter().copied().collect()
    }

    fn origin() -> &'static Path {
        Path::new("p2_prediction.csv")
    }

    fn policy(truth: &[(i64, i64)], k: usize, weight: f64) -> ClusteringPolicy {
        let mut params = ClusteringParams::new("unused.csv");
        params.expected_clusters = k;
        params.weight = weight;
        ClusteringPolicy::with_truth(params, table(truth))
    }

    #[test]
    fn test_next_permutation_is_lexicographic() {
        let mut items = vec![0, 1, 2];
        let mut seen = vec![items.clone()];
        while next_permutation(&mut items) {
            seen.push(items.clone());
        }
        assert_eq!(
            seen,
            vec![
                vec![0, 1, 2],
                vec![0, 2, 1],
                vec![1, 0, 2],
                vec![1, 2, 0],
                vec![2, 0, 1],
                vec![2, 1, 0],
            ]
        );
    }

    #[test]
    fn test_two_category_swap_scores_full_marks() {
        // categories A=0, B=1; predicted 1 -> A and 0 -> B
        let policy = policy(&[(0, 0), (1, 0), (2, 1), (3, 1)], 2, 1.0);
        let predictions = table(&[(0, 1), (1, 1), (2, 0), (3, 0)]);

        let alignment = best_alignment(&policy.truth, &predictions, 2, origin()).unwrap();
        assert_eq!(alignment.permutation, vec![1, 0]);
        assert_eq!(alignment.accuracy, 1.0);

        let record = policy.grade_predictions(&predictions, origin()).unwrap();
        assert_eq!(record.score(), Some(100.0));
        assert_eq!(record.accuracy, Some(1.0));
        assert_eq!(record.reindexer.as_deref(), Some("1-0"));
        assert_eq!(record.message(), None);
    }

    #[test]
    fn test_alignment_is_maximal_over_all_relabelings() {
        let truth = table(&[(0, 0), (1, 1), (2, 2), (3, 2), (4, 1), (5, 0), (6, 2)]);
        let predictions = table(&[(0, 2), (1, 0), (2, 1), (3, 1), (4, 2), (5, 2), (6, 0)]);
        let alignment = best_alignment(&truth, &predictions, 3, origin()).unwrap();

        let mut permutation = vec![0, 1, 2];
        loop {
            let agree = truth
                .iter()
                .filter(|&(id, c)| permutation[predictions[id] as usize] as i64 == *c)
                .count() as f64
                / truth.len() as f64;
            assert!(agree <= alignment.accuracy);
            if !next_permutation(&mut permutation) {
                break;
            }
        }
    }

    #[test]
    fn test_ties_keep_first_permutation() {
        // Every relabeling agrees on exactly one of two items
        let truth = table(&[(0, 0), (1, 0)]);
        let predictions = table(&[(0, 0), (1, 1)]);
        let alignment = best_alignment(&truth, &predictions, 2, origin()).unwrap();
        assert_eq!(alignment.permutation, vec![0, 1]);
        assert_eq!(alignment.accuracy, 0.5);
    }

    #[test]
    fn test_over_segmentation_gets_partial_score() {
        let policy = policy(&[(0, 0)], 5, 0.6);
        let predictions = table(&[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)]);

        let record = policy.grade_predictions(&predictions, origin()).unwrap();
        assert_eq!(record.score(), Some(36.0));
        assert_eq!(record.message(), Some("#classes != 5: 7"));
        assert_eq!(record.accuracy, None);
    }

    #[test]
    fn test_too_few_or_too_many_clusters_need_review() {
        let policy = policy(&[(0, 0)], 5, 0.6);

        let record = policy
            .grade_predictions(&table(&[(0, 0), (1, 1)]), origin())
            .unwrap();
        assert_eq!(record.score(), Some(0.0));
        assert_eq!(record.message(), Some("MANUAL. #classes != 5: 2"));

        let many: BTreeMap<i64, i64> = (0..20).map(|i| (i, i)).collect();
        let record = policy.grade_predictions(&many, origin()).unwrap();
        assert_eq!(record.message(), Some("MANUAL. #classes != 5: 20"));
    }

    #[test]
    fn test_low_accuracy_needs_review() {
        // 10 items, K=5, only the first two ids can ever agree
        let truth: BTreeMap<i64, i64> = (0..10).map(|i| (i, if i < 2 { 0 } else { 5 })).collect();
        let predictions: BTreeMap<i64, i64> = (0..10).map(|i| (i, i % 5)).collect();
        let policy = ClusteringPolicy::with_truth(ClusteringParams::new("unused.csv"), truth);

        let record = policy.grade_predictions(&predictions, origin()).unwrap();
        assert_eq!(record.score(), Some(0.0));
        assert_eq!(record.message(), Some("MANUAL: Accuracy 10.0 < 20%"));
        assert_eq!(record.accuracy, None);
    }

    #[test]
    fn test_ramp_score_is_weighted() {
        // 4 of 5 correct under identity: 80% -> 100, weighted by 0.6
        let truth: BTreeMap<i64, i64> = (0..5).map(|i| (i, i.min(3))).collect();
        let predictions: BTreeMap<i64, i64> = (0..5).map(|i| (i, i)).collect();
        let policy = ClusteringPolicy::with_truth(ClusteringParams::new("unused.csv"), truth);

        let record = policy.grade_predictions(&predictions, origin()).unwrap();
        assert_eq!(record.accuracy, Some(0.8));
        assert_eq!(record.score(), Some(60.0));
        assert_eq!(record.reindexer.as_deref(), Some("0-1-2-3-4"));
    }

    #[test]
    fn test_out_of_range_label_is_malformed() {
        let policy = policy(&[(0, 0), (1, 1)], 2, 1.0);
        let err = policy
            .grade_predictions(&table(&[(0, 0), (1, 7)]), origin())
            .unwrap_err();
        assert!(matches!(err, GradeError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_missing_prediction_is_malformed() {
        let policy = policy(&[(0, 0), (1, 1), (2, 1)], 2, 1.0);
        let err = policy
            .grade_predictions(&table(&[(0, 0), (1, 1)]), origin())
            .unwrap_err();
        assert!(err.to_string().contains("no prediction for id 2"));
    }

    #[test]
    fn test_params_must_be_finite() {
        ClusteringParams::new("labels.csv").validate().unwrap();

        let mut params = ClusteringParams::new("labels.csv");
        params.weight = f64::NAN;
        assert!(matches!(params.validate(), Err(GradeError::Config(_))));

        let mut params = ClusteringParams::new("labels.csv");
        params.partial_score = f64::INFINITY;
        assert!(params.validate().is_err());

        let mut params = ClusteringParams::new("labels.csv");
        params.expected_clusters = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_inspect_reads_prediction_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("p2_prediction.csv");
        std::fs::write(&path, "id,category\n0,1\n1,1\n2,0\n3,0\n").unwrap();

        let policy = policy(&[(0, 0), (1, 0), (2, 1), (3, 1)], 2, 0.6);
        let record = policy.inspect(&path).unwrap();
        assert_eq!(record.score(), Some(60.0));
    }
}
