//! Subprocess execution.
//!
//! Adapters never touch `tokio::process` directly; they describe the command
//! as a [`CommandSpec`] and hand it to a [`CommandRunner`]. Tests substitute
//! [`ScriptedRunner`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PlatformError, Result};

/// A subprocess invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// Bytes written to stdin, which is then closed
    pub stdin: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `program arg1 arg2 ...`, for logs and plans
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Best error message: trimmed stderr, else stdout, else the exit status
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs subprocesses on behalf of platform adapters
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Start in the background and return its pid.
    ///
    /// Output is appended to `log_file` when given, discarded otherwise.
    async fn spawn_detached(&self, spec: &CommandSpec, log_file: Option<&Path>) -> Result<u32>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec.display(), "running");

        let mut cmd = Self::command(spec);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| PlatformError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        // The child may fill stdout before it drains stdin
        if let (Some(input), Some(mut stdin)) = (spec.stdin.clone(), child.stdin.take()) {
            let program = spec.program.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(%program, error = %e, "stdin closed early");
                }
            });
        }

        let wait = child.wait_with_output();
        let output = match spec.timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                PlatformError::Timeout {
                    program: spec.program.clone(),
                    timeout,
                }
            })?,
            None => wait.await,
        }
        .map_err(|source| PlatformError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn spawn_detached(&self, spec: &CommandSpec, log_file: Option<&Path>) -> Result<u32> {
        debug!(command = %spec.display(), log_file = ?log_file, "spawning detached");

        let mut cmd = Self::command(spec);
        cmd.stdin(Stdio::null()).kill_on_drop(false).process_group(0);

        match log_file {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir).map_err(|e| PlatformError::io(dir, e))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| PlatformError::io(path, e))?;
                let err = file.try_clone().map_err(|e| PlatformError::io(path, e))?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(err));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(|source| PlatformError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        child.id().ok_or_else(|| PlatformError::UnexpectedOutput {
            tool: spec.program.clone(),
            reason: "process exited before its pid could be read".to_string(),
        })
    }
}

/// Test runner that replays scripted outputs and records every spec.
///
/// Outputs are consumed in order; once exhausted every call succeeds with
/// empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    outputs: Mutex<VecDeque<Result<CommandOutput>>>,
    calls: Mutex<Vec<CommandSpec>>,
    next_pid: Mutex<u32>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            next_pid: Mutex::new(40_000),
            ..Default::default()
        }
    }

    /// Queue the next output.
    pub fn push(&self, output: CommandOutput) -> &Self {
        self.outputs.lock().push_back(Ok(output));
        self
    }

    /// Queue a fault.
    pub fn push_error(&self, error: PlatformError) -> &Self {
        self.outputs.lock().push_back(Err(error));
        self
    }

    /// Every spec seen so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Recorded invocations rendered as command lines.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(CommandSpec::display).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().push(spec.clone());
        self.outputs
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::ok("")))
    }

    async fn spawn_detached(&self, spec: &CommandSpec, _log_file: Option<&Path>) -> Result<u32> {
        self.calls.lock().push(spec.clone());
        let mut pid = self.next_pid.lock();
        *pid += 1;
        Ok(*pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.error_message(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_tokio_runner_feeds_stdin() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(&CommandSpec::new("cat").stdin(b"restored".to_vec()))
            .await
            .unwrap();
        assert_eq!(output.stdout, "restored");
    }

    #[tokio::test]
    async fn test_tokio_runner_timeout() {
        let runner = TokioCommandRunner::new();
        let err = runner
            .run(&CommandSpec::new("sleep").arg("5").timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = TokioCommandRunner::new();
        let err = runner
            .run(&CommandSpec::new("orbit-definitely-not-a-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_scripted_runner_replays_in_order() {
        let runner = ScriptedRunner::new();
        runner.push(CommandOutput::ok("first")).push(CommandOutput::failed(1, "second"));

        let a = runner.run(&CommandSpec::new("docker").arg("ps")).await.unwrap();
        let b = runner.run(&CommandSpec::new("docker").arg("ps")).await.unwrap();
        let c = runner.run(&CommandSpec::new("docker").arg("ps")).await.unwrap();

        assert_eq!(a.stdout, "first");
        assert_eq!(b.error_message(), "second");
        assert!(c.success());
        assert_eq!(runner.command_lines(), vec!["docker ps"; 3]);
    }
}
