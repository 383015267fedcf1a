//! Structured subprocess invocation.
//!
//! External tools are always run from an argument vector, never through a
//! shell. The [`ProcessRunner`] trait is the seam tests replace with a
//! scripted runner.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Stage;

/// Longest stderr excerpt carried in an error.
const MAX_STDERR_CHARS: usize = 1000;

/// One external program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the program at lower priority through `nice`.
    pub fn niced(self, niceness: Option<i32>) -> Self {
        let Some(n) = niceness else {
            return self;
        };
        let mut args: Vec<OsString> = vec!["-n".into(), n.to_string().into(), self.program.into()];
        args.extend(self.args);
        Self {
            program: PathBuf::from("nice"),
            args,
            cwd: self.cwd,
            timeout: self.timeout,
        }
    }

    /// Name of the tool actually doing the work, skipping a `nice` wrapper.
    pub fn tool_name(&self) -> String {
        let program = if self.program == Path::new("nice") && self.args.len() > 2 {
            Path::new(&self.args[2])
        } else {
            self.program.as_path()
        };
        program
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string())
    }

    /// Script argument for `python <script> ...` style tools.
    pub fn script_name(&self) -> Option<String> {
        let offset = if self.program == Path::new("nice") { 3 } else { 0 };
        self.args
            .get(offset)
            .map(|a| Path::new(a))
            .and_then(|p| p.file_name())
            .map(|f| f.to_string_lossy().into_owned())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Why a process could not produce a [`ProcessOutput`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("program not found: {0}")]
    NotFound(PathBuf),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to run: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> std::result::Result<ProcessOutput, RunError>;
}

/// Runs processes with tokio. Children are killed when a timeout fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

#[async_trait::async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(&self, invocation: &Invocation) -> std::result::Result<ProcessOutput, RunError> {
        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        debug!(program = %invocation.program.display(), args = ?invocation.args, "spawning");

        let output = command.output();
        let output = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| RunError::TimedOut(limit))?,
            None => output.await,
        }
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound(invocation.program.clone())
            } else {
                RunError::Io(e)
            }
        })?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Run a tool for `stage` and require a zero exit status.
pub async fn run_tool(
    runner: &dyn ProcessRunner,
    stage: Stage,
    invocation: &Invocation,
) -> Result<ProcessOutput> {
    let output = run_tool_unchecked(runner, stage, invocation).await?;
    if !output.success() {
        let stderr: String = output.stderr_lossy().chars().take(MAX_STDERR_CHARS).collect();
        let status = output
            .code
            .map_or_else(|| "killed by signal".to_string(), |c| format!("exit status {c}"));
        return Err(Error::ExternalToolFailure {
            stage,
            tool: invocation.tool_name(),
            detail: format!("{status}: {}", stderr.trim()),
        });
    }
    Ok(output)
}

/// Run a tool for `stage`, mapping launch failures and timeouts but leaving
/// the exit status to the caller.
pub async fn run_tool_unchecked(
    runner: &dyn ProcessRunner,
    stage: Stage,
    invocation: &Invocation,
) -> Result<ProcessOutput> {
    runner.run(invocation).await.map_err(|e| match e {
        RunError::TimedOut(after) => Error::ToolTimeout {
            stage,
            tool: invocation.tool_name(),
            after,
        },
        other => Error::ExternalToolFailure {
            stage,
            tool: invocation.tool_name(),
            detail: other.to_string(),
        },
    })
}
