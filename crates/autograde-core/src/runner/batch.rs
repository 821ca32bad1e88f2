//! Batch orchestration over a population directory
//!
//! Every immediate subdirectory of the population directory is one
//! submission. Submissions are graded strictly one after another in sorted
//! order, since they share one sandbox. A failing submission yields a
//! placeholder record and the batch moves on; only an unreadable population
//! directory stops the batch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::instrument::WithSubscriber;

use super::Harness;
use crate::error::{GradeError, GradeResult};
use crate::logging::BatchLog;
use crate::policy::GradingPolicy;
use crate::record::ResultRecord;

/// Directory names that are never submissions
pub const DEFAULT_IGNORE: &[&str] = &[
    "logs",
    "zips",
    "data",
    "parser",
    "grader",
    "codebleu",
    "sandbox",
    "__pycache__",
];

/// Which population entries are graded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    /// When set, only these ids are graded
    pub allow: Option<BTreeSet<String>>,
    /// Ids that are never graded
    pub deny: BTreeSet<String>,
    /// Non-submission directory names to skip
    pub ignore: BTreeSet<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            allow: None,
            deny: BTreeSet::new(),
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Filters {
    pub fn with_allow<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_deny<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether submission `id` passes the allow and deny lists
    pub fn admits(&self, id: &str) -> bool {
        if self.ignore.contains(id) {
            return false;
        }
        if let Some(allow) = &self.allow {
            if !allow.contains(id) {
                return false;
            }
        }
        !self.deny.contains(id)
    }
}

/// Outcome of a whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: ResultRecord")]
pub struct BatchReport<R> {
    /// One record per processed submission, keyed and ordered by id
    pub results: BTreeMap<String, R>,
    /// Submissions whose cycle raised an error
    pub failed: Vec<String>,
    /// Submissions whose command exceeded its budget
    pub timed_out: Vec<String>,
}

impl<R> Default for BatchReport<R> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            failed: Vec::new(),
            timed_out: Vec::new(),
        }
    }
}

impl<R> BatchReport<R> {
    pub fn processed(&self) -> usize {
        self.results.len()
    }

    pub fn successful(&self) -> usize {
        self.processed() - self.failed.len()
    }
}

/// Sorted submission ids found under `population`, after filtering
pub fn enumerate_population(population: &Path, filters: &Filters) -> GradeResult<Vec<String>> {
    let population_error = |e: std::io::Error| GradeError::Population {
        message: e.to_string(),
        path: population.to_path_buf(),
    };

    let mut ids = Vec::new();
    for entry in std::fs::read_dir(population).map_err(population_error)? {
        let entry = entry.map_err(population_error)?;
        let Some(id) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!("Skipping non UTF-8 entry {}", entry.path().display());
            continue;
        };
        if !entry.path().is_dir() {
            continue;
        }
        if filters.admits(&id) {
            ids.push(id);
        }
    }
    ids.sort();
    Ok(ids)
}

/// Sequential grader for a whole population
pub struct BatchRunner<P: GradingPolicy> {
    policy: P,
    harness: Harness,
    filters: Filters,
    log: BatchLog,
}

impl<P: GradingPolicy> BatchRunner<P> {
    pub fn new(policy: P, harness: Harness, log: BatchLog) -> Self {
        Self {
            policy,
            harness,
            filters: Filters::default(),
            log,
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn log(&self) -> &BatchLog {
        &self.log
    }

    /// Grade every admitted submission under `population`
    pub async fn run(&self, population: impl AsRef<Path>) -> GradeResult<BatchReport<P::Record>> {
        self.run_population(population.as_ref())
            .with_subscriber(self.log.dispatch().clone())
            .await
    }

    /// Flush and release the batch log
    pub fn finish(self) -> GradeResult<()> {
        self.log.close()
    }

    async fn run_population(&self, population: &Path) -> GradeResult<BatchReport<P::Record>> {
        let ids = enumerate_population(population, &self.filters)?;
        tracing::info!(
            policy = self.policy.name(),
            "Grading {} submissions from {}",
            ids.len(),
            population.display()
        );

        let mut report = BatchReport::default();
        for id in ids {
            tracing::info!("Grading {}", id);
            let record = match self.harness.grade(&self.policy, &population.join(&id)).await {
                Ok(graded) => {
                    if graded.timed_out {
                        report.timed_out.push(id.clone());
                    }
                    graded.record
                }
                Err(e) => {
                    tracing::error!("Error grading {}: {}", id, e);
                    report.failed.push(id.clone());
                    P::Record::placeholder(e.to_string())
                }
            };
            tracing::info!("Result for {}: {}", id, render(&record));
            report.results.insert(id, record);
        }

        tracing::info!("Grading complete");
        tracing::info!(
            "Processed {} files, {} successful, {} failed",
            report.processed(),
            report.successful(),
            report.failed.len()
        );
        tracing::info!("Failed students: {:?}", report.failed);
        if !report.timed_out.is_empty() {
            tracing::info!("Timed out: {:?}", report.timed_out);
        }
        Ok(report)
    }
}

fn render<R: ResultRecord>(record: &R) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record))
}
