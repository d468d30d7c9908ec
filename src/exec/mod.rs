//! External tool invocation.
//!
//! Every host-side operation (volume manager, iSCSI target admin) is a single
//! command line run to completion. Commands are spawned directly rather than
//! through a shell, so request-supplied names are passed as plain arguments.

use async_trait::async_trait;
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default deadline for a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
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
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", describe_exit(code))]
    Failed { command: String, code: Option<i32>, stderr: String },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

pub type ExecResult<T> = Result<T, ExecError>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

/// Runs a command line and returns its captured standard output.
#[cfg_attr(any(test, feature = "mockall"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandLine) -> ExecResult<String>;
}

/// Runs commands as child processes with a per-invocation deadline.
///
/// The child is killed when the deadline passes or when the calling future is
/// dropped, so request cancellation reaches the external tool.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine) -> ExecResult<String> {
        let rendered = command.to_string();
        tracing::debug!(command = %rendered, "Executing external command");

        let child = Command::new(&command.program)
            .args(&command.args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => {
                result.map_err(|source| ExecError::Spawn { command: rendered.clone(), source })?
            }
            Err(_) => {
                tracing::warn!(command = %rendered, "External command timed out");
                return Err(ExecError::TimedOut { command: rendered, timeout: self.timeout });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(command = %rendered, status = ?output.status.code(), "External command failed: {}", stderr);
            return Err(ExecError::Failed { command: rendered, code: output.status.code(), stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
