//! One grading cycle for one submission
//!
//! In execute mode the cycle is locate -> stage in the sandbox -> inject
//! fixtures -> policy preparation -> run the command -> interpret. In inspect
//! mode the located artifact goes straight to the policy.

use std::path::Path;

use super::{CommandSpec, ExecutionDriver, Outcome};
use crate::error::GradeResult;
use crate::locate::Anchor;
use crate::policy::GradingPolicy;
use crate::sandbox::{Fixture, Sandbox};

/// How submissions are graded
#[derive(Debug, Clone)]
pub enum GradingMode {
    /// Stage the directory holding `anchor` and run `command` in it
    Execute {
        anchor: Anchor,
        command: CommandSpec,
        fixtures: Vec<Fixture>,
    },
    /// Hand the file matching `anchor` to the policy without running anything
    Inspect { anchor: Anchor },
}

impl GradingMode {
    pub fn anchor(&self) -> &Anchor {
        match self {
            Self::Execute { anchor, .. } | Self::Inspect { anchor } => anchor,
        }
    }
}

/// Record of one cycle
#[derive(Debug, Clone)]
pub struct Graded<R> {
    pub record: R,
    /// The command exceeded its budget and `record` is the timeout record
    pub timed_out: bool,
}

/// Runs single grading cycles against a shared sandbox
#[derive(Debug, Clone)]
pub struct Harness {
    sandbox: Sandbox,
    mode: GradingMode,
}

impl Harness {
    pub fn new(sandbox: Sandbox, mode: GradingMode) -> Self {
        Self { sandbox, mode }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn mode(&self) -> &GradingMode {
        &self.mode
    }

    /// Grade the submission rooted at `submission`
    pub async fn grade<P: GradingPolicy>(
        &self,
        policy: &P,
        submission: &Path,
    ) -> GradeResult<Graded<P::Record>> {
        match &self.mode {
            GradingMode::Execute {
                anchor,
                command,
                fixtures,
            } => {
                let source = anchor.locate_dir(submission)?;
                self.sandbox.initialize(&source)?;
                self.sandbox.inject(fixtures)?;
                policy.prepare_sandbox(&self.sandbox)?;
                tracing::debug!(files = ?self.sandbox.list_files(), "Sandbox staged");

                match ExecutionDriver::run(self.sandbox.root(), command).await? {
                    Outcome::Completed(completed) => {
                        tracing::debug!(
                            status = ?completed.status,
                            success = completed.success(),
                            "Command finished in {:?}",
                            completed.duration
                        );
                        Ok(Graded {
                            record: policy.interpret(&self.sandbox, &completed)?,
                            timed_out: false,
                        })
                    }
                    Outcome::TimedOut { after } => Ok(Graded {
                        record: policy.on_timeout(after),
                        timed_out: true,
                    }),
                }
            }
            GradingMode::Inspect { anchor } => {
                let artifact = anchor.locate(submission)?;
                tracing::debug!("Inspecting {}", artifact.display());
                Ok(Graded {
                    record: policy.inspect(&artifact)?,
                    timed_out: false,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::GradeError;
    use crate::policy::{UnitTestLogParams, UnitTestLogPolicy};
    use crate::record::ResultRecord;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn execute(command: &str, fixtures: Vec<Fixture>) -> GradingMode {
        GradingMode::Execute {
            anchor: Anchor::exact("main.sh"),
            command: CommandSpec::shell(command)
                .capture(true)
                .with_timeout(Duration::from_secs(10)),
            fixtures,
        }
    }

    #[tokio::test]
    async fn test_execute_cycle_runs_in_staged_source_dir() {
        let temp_dir = TempDir::new().unwrap();
        let submission = temp_dir.path().join("alice");
        write(&submission, "nested/project/main.sh", "");
        write(&submission, "nested/project/report.txt", "..........\n");
        write(temp_dir.path(), "ref/separator.txt", "========\n");

        let harness = Harness::new(
            Sandbox::at_path(temp_dir.path().join("sandbox")),
            execute(
                "cat report.txt separator.txt >&2",
                vec![Fixture::new(temp_dir.path().join("ref/separator.txt"), "separator.txt")],
            ),
        );

        let graded = harness
            .grade(&UnitTestLogPolicy::default(), &submission)
            .await
            .unwrap();
        assert!(!graded.timed_out);
        assert_eq!(graded.record.score(), Some(20.0));
        assert!(harness.sandbox().file_exists("main.sh"));
        assert_eq!(
            harness.sandbox().list_files(),
            vec![
                std::path::PathBuf::from("main.sh"),
                std::path::PathBuf::from("report.txt"),
                std::path::PathBuf::from("separator.txt"),
            ]
        );
    }

    #[tokio::test]
    async fn test_timeout_becomes_zero_record() {
        let temp_dir = TempDir::new().unwrap();
        let submission = temp_dir.path().join("bob");
        write(&submission, "main.sh", "");

        let harness = Harness::new(
            Sandbox::at_path(temp_dir.path().join("sandbox")),
            GradingMode::Execute {
                anchor: Anchor::exact("main.sh"),
                command: CommandSpec::argv(["sleep", "30"])
                    .capture(true)
                    .with_timeout(Duration::from_millis(200)),
                fixtures: Vec::new(),
            },
        );

        let graded = harness
            .grade(&UnitTestLogPolicy::new(UnitTestLogParams::default()), &submission)
            .await
            .unwrap();
        assert!(graded.timed_out);
        assert_eq!(graded.record.score(), Some(0.0));
        assert_eq!(graded.record.message(), Some("Timeout"));
    }

    #[tokio::test]
    async fn test_missing_anchor_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let submission = temp_dir.path().join("carol");
        write(&submission, "other.sh", "");

        let harness = Harness::new(
            Sandbox::at_path(temp_dir.path().join("sandbox")),
            execute("true", Vec::new()),
        );
        let err = harness
            .grade(&UnitTestLogPolicy::default(), &submission)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_inspect_mode_needs_inspecting_policy() {
        let temp_dir = TempDir::new().unwrap();
        let submission = temp_dir.path().join("dave");
        write(&submission, "out/p2_prediction.csv", "id,label\n0,1\n");

        let harness = Harness::new(
            Sandbox::at_path(temp_dir.path().join("sandbox")),
            GradingMode::Inspect {
                anchor: Anchor::suffix("prediction.csv"),
            },
        );
        let err = harness
            .grade(&UnitTestLogPolicy::default(), &submission)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::Unsupported { procedure: "inspect", .. }));
    }
}
