//! Assignment configuration
//!
//! One file describes one grading batch: where submissions live, how each is
//! staged and run, and which scoring policy interprets the outcome. YAML and
//! JSON are both accepted, chosen by file extension.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};
use crate::locate::Anchor;
use crate::policy::{AucParams, ClusteringParams, CountPairParams, UnitTestLogParams};
use crate::runner::{CommandSpec, DEFAULT_IGNORE, Filters, GradingMode};
use crate::sandbox::{Fixture, Sandbox};

/// How each submission is graded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModeConfig {
    Execute {
        command: String,
        /// Run `command` through `sh -c` instead of splitting it into argv
        #[serde(default)]
        shell: bool,
        #[serde(default)]
        timeout_secs: Option<u64>,
        #[serde(default = "default_capture_output")]
        capture_output: bool,
    },
    Inspect,
}

fn default_capture_output() -> bool {
    true
}

/// Scoring policy selection and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    Clustering(ClusteringParams),
    Auc(AucParams),
    UnitTestLog(UnitTestLogParams),
    CountPair(CountPairParams),
}

impl PolicyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clustering(_) => "clustering",
            Self::Auc(_) => "auc",
            Self::UnitTestLog(_) => "unit_test_log",
            Self::CountPair(_) => "count_pair",
        }
    }

    /// Check the policy parameters on their own
    pub fn validate(&self) -> GradeResult<()> {
        match self {
            Self::Clustering(params) => params.validate(),
            Self::Auc(params) => params.validate(),
            Self::UnitTestLog(params) => params.validate(),
            Self::CountPair(_) => Ok(()),
        }
    }
}

/// Configuration for one grading batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Batch name used for output and log file names
    pub name: String,

    /// Directory whose subdirectories are submissions
    #[serde(default = "default_population_dir")]
    pub population_dir: PathBuf,

    /// Reused working directory
    #[serde(default = "default_sandbox_dir")]
    pub sandbox_dir: PathBuf,

    /// Parent of the per-run output directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File identifying the source root (execute) or the artifact (inspect)
    pub anchor: Anchor,

    pub mode: ModeConfig,

    /// Reference files copied over each staged submission
    #[serde(default)]
    pub fixtures: Vec<Fixture>,

    /// When present, only these submissions are graded
    #[serde(default)]
    pub allow: Option<Vec<String>>,

    #[serde(default)]
    pub deny: Vec<String>,

    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    pub policy: PolicyConfig,
}

fn default_population_dir() -> PathBuf {
    PathBuf::from("./student_files")
}

fn default_sandbox_dir() -> PathBuf {
    PathBuf::from("sandbox")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect()
}

impl AssignmentConfig {
    /// Create a config with default directories
    pub fn new(name: impl Into<String>, anchor: Anchor, mode: ModeConfig, policy: PolicyConfig) -> Self {
        Self {
            name: name.into(),
            population_dir: default_population_dir(),
            sandbox_dir: default_sandbox_dir(),
            output_dir: default_output_dir(),
            anchor,
            mode,
            fixtures: Vec::new(),
            allow: None,
            deny: Vec::new(),
            ignore: default_ignore(),
            policy,
        }
    }

    /// Load from a `.yaml`/`.yml` or `.json` file and validate
    pub fn load(path: impl AsRef<Path>) -> GradeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GradeError::io(path, e))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(GradeError::Config(format!(
                "Unsupported assignment file extension: {}",
                path.display()
            ))),
        }?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> GradeResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| GradeError::Config(format!("Invalid assignment YAML: {}", e)))
    }

    pub fn from_json_str(content: &str) -> GradeResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| GradeError::Config(format!("Invalid assignment JSON: {}", e)))
    }

    /// Reject settings that would fail for every submission
    pub fn validate(&self) -> GradeResult<()> {
        if self.name.trim().is_empty() {
            return Err(GradeError::Config("Assignment name is empty".to_string()));
        }
        if self.name.contains(['/', '\\']) {
            return Err(GradeError::Config(format!(
                "Assignment name {:?} must not contain path separators",
                self.name
            )));
        }
        if self.anchor.file.is_empty() {
            return Err(GradeError::Config("Anchor file name is empty".to_string()));
        }

        for fixture in &self.fixtures {
            let dest = Path::new(&fixture.dest);
            if dest.is_absolute()
                || dest
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
            {
                return Err(GradeError::Config(format!(
                    "Fixture destination {:?} must stay inside the sandbox",
                    fixture.dest
                )));
            }
            if !fixture.source.exists() {
                return Err(GradeError::Config(format!(
                    "Fixture source {} does not exist",
                    fixture.source.display()
                )));
            }
        }

        self.policy.validate()?;

        match (&self.mode, &self.policy) {
            (ModeConfig::Inspect, PolicyConfig::UnitTestLog(_) | PolicyConfig::CountPair(_)) => {
                Err(GradeError::Config(format!(
                    "Policy {} grades command output and needs execute mode",
                    self.policy.name()
                )))
            }
            (ModeConfig::Execute { command, shell, .. }, _) => {
                CommandSpec::parse(command, *shell).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Set the population directory
    pub fn with_population_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.population_dir = dir.into();
        self
    }

    /// Set the sandbox directory
    pub fn with_sandbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sandbox_dir = dir.into();
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_fixture(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// Restrict grading to `ids`
    pub fn with_allow(mut self, ids: Vec<String>) -> Self {
        self.allow = Some(ids);
        self
    }

    /// Never grade `ids`
    pub fn with_deny(mut self, ids: Vec<String>) -> Self {
        self.deny = ids;
        self
    }

    pub fn sandbox(&self) -> Sandbox {
        Sandbox::at_path(&self.sandbox_dir)
    }

    pub fn filters(&self) -> Filters {
        let filters = Filters::default()
            .with_deny(self.deny.iter().cloned())
            .with_ignore(self.ignore.iter().cloned());
        match &self.allow {
            Some(allow) => filters.with_allow(allow.iter().cloned()),
            None => filters,
        }
    }

    pub fn grading_mode(&self) -> GradeResult<GradingMode> {
        match &self.mode {
            ModeConfig::Execute {
                command,
                shell,
                timeout_secs,
                capture_output,
            } => {
                let mut spec = CommandSpec::parse(command, *shell)?.capture(*capture_output);
                if let Some(secs) = timeout_secs {
                    spec = spec.with_timeout(Duration::from_secs(*secs));
                }
                Ok(GradingMode::Execute {
                    anchor: self.anchor.clone(),
                    command: spec,
                    fixtures: self.fixtures.clone(),
                })
            }
            ModeConfig::Inspect => Ok(GradingMode::Inspect {
                anchor: self.anchor.clone(),
            }),
        }
    }
}
