//! Execution driver for submission-supplied commands
//!
//! Runs one command with the sandbox as working directory under a wall-clock
//! budget. The command is started in its own process group so that a timeout
//! takes down everything it spawned, not just the direct child.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{GradeError, GradeResult};

/// How the command is handed to the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invocation {
    /// Program plus arguments, no shell involved
    Argv(Vec<String>),
    /// A string interpreted by `sh -c`
    Shell(String),
}

/// A command to run in the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub invocation: Invocation,
    /// Wall-clock budget; `None` waits forever
    pub timeout: Option<Duration>,
    /// Capture stdout/stderr instead of inheriting them
    pub capture_output: bool,
}

impl CommandSpec {
    pub fn argv(argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            invocation: Invocation::Argv(argv.into_iter().map(Into::into).collect()),
            timeout: None,
            capture_output: false,
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            invocation: Invocation::Shell(command.into()),
            timeout: None,
            capture_output: false,
        }
    }

    /// Build from a command line. Without `shell` the line is split into
    /// argv with POSIX quoting rules and executed directly.
    pub fn parse(command: &str, shell: bool) -> GradeResult<Self> {
        if shell {
            return Ok(Self::shell(command));
        }
        let argv = shell_words::split(command)
            .map_err(|e| GradeError::Config(format!("Cannot split command {:?}: {}", command, e)))?;
        if argv.is_empty() {
            return Err(GradeError::Config("Empty grading command".to_string()));
        }
        Ok(Self::argv(argv))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn capture(mut self, capture_output: bool) -> Self {
        self.capture_output = capture_output;
        self
    }

    fn command(&self) -> GradeResult<Command> {
        match &self.invocation {
            Invocation::Argv(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| GradeError::Config("Empty grading command".to_string()))?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                Ok(cmd)
            }
            Invocation::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                Ok(cmd)
            }
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.invocation {
            Invocation::Argv(argv) => write!(f, "{}", shell_words::join(argv)),
            Invocation::Shell(line) => write!(f, "sh -c {:?}", line),
        }
    }
}

/// A command that ran to completion (with any exit status)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completed {
    /// Exit code; `None` when terminated by a signal
    pub status: Option<i32>,
    /// Captured stdout; `None` when the stream was inherited
    pub stdout: Option<Vec<u8>>,
    /// Captured stderr; `None` when the stream was inherited
    pub stderr: Option<Vec<u8>>,
    pub duration: Duration,
}

impl Completed {
    pub fn stdout_text(&self) -> Option<String> {
        self.stdout
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn stderr_text(&self) -> Option<String> {
        self.stderr
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Raw result of one dynamic grading cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(Completed),
    /// The budget elapsed; the process group was killed
    TimedOut { after: Duration },
}

/// Runs grading commands
pub struct ExecutionDriver;

impl ExecutionDriver {
    /// Run `spec` inside `working_dir`.
    ///
    /// Exceeding the budget is reported as [`Outcome::TimedOut`], not as an
    /// error; errors are reserved for commands that cannot be started or
    /// waited on.
    pub async fn run(working_dir: impl AsRef<Path>, spec: &CommandSpec) -> GradeResult<Outcome> {
        let working_dir = working_dir.as_ref();
        let start = Instant::now();

        let mut cmd = spec.command()?;
        cmd.current_dir(working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if spec.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        #[cfg(unix)]
        own_process_group(&mut cmd);

        tracing::debug!(command = %spec, cwd = %working_dir.display(), "Spawning grading command");
        let mut child = cmd
            .spawn()
            .map_err(|e| GradeError::Spawn(format!("{}: {}", spec, e)))?;
        let pid = child.id();

        let stdout_task = child.stdout.take().map(|s| tokio::spawn(read_all(s)));
        let stderr_task = child.stderr.take().map(|s| tokio::spawn(read_all(s)));

        let collected = match spec.timeout {
            Some(limit) => timeout(limit, collect(&mut child, stdout_task, stderr_task))
                .await
                .ok(),
            None => Some(collect(&mut child, stdout_task, stderr_task).await),
        };

        match collected {
            Some(result) => {
                let mut completed = result.map_err(|e| GradeError::io(working_dir, e))?;
                completed.duration = start.elapsed();
                Ok(Outcome::Completed(completed))
            }
            None => {
                terminate(&mut child, pid).await;
                let after = spec.timeout.unwrap_or_default();
                tracing::warn!(command = %spec, "Command exceeded {:?}, process group killed", after);
                Ok(Outcome::TimedOut { after })
            }
        }
    }
}

/// Put the child at the head of a fresh process group
#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use nix::unistd::{Pid, setpgid};

    unsafe {
        cmd.pre_exec(|| {
            setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(std::io::Error::from)
        });
    }
}

async fn read_all<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Vec<u8> {
    let mut buf = Vec::new();
    // A read error just truncates the capture
    if let Err(e) = reader.read_to_end(&mut buf).await {
        tracing::debug!("Captured output truncated after {} bytes: {}", buf.len(), e);
    }
    buf
}

async fn collect(
    child: &mut Child,
    stdout_task: Option<JoinHandle<Vec<u8>>>,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
) -> std::io::Result<Completed> {
    let status = child.wait().await?;

    let stdout = match stdout_task {
        Some(task) => Some(task.await.unwrap_or_default()),
        None => None,
    };
    let stderr = match stderr_task {
        Some(task) => Some(task.await.unwrap_or_default()),
        None => None,
    };

    Ok(Completed {
        status: status.code(),
        stdout,
        stderr,
        duration: Duration::ZERO,
    })
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!("Failed to SIGKILL process group {}: {}", pid, e);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill grading command: {}", e);
    }
}
