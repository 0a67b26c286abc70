//! Command executors for the `graphgate` binary.

use std::process::Stdio;

use async_trait::async_trait;
use graphgate_core::{CommandExecutor, ExecutionOutput, ExecutorError, Invocation};
use tokio::process::Command;

use crate::config::ExecutorConfig;

/// Environment variables describing the invocation, set on the child process.
pub const ENV_CORRELATION_ID: &str = "GRAPHGATE_CORRELATION_ID";
pub const ENV_PRINCIPAL: &str = "GRAPHGATE_PRINCIPAL";
pub const ENV_ORG_ID: &str = "GRAPHGATE_ORG_ID";
pub const ENV_WORKSPACE_ID: &str = "GRAPHGATE_WORKSPACE_ID";
pub const ENV_SECRET_ACTIONS: &str = "GRAPHGATE_SECRET_ACTIONS";

/// Runs the configured program as a child process.
///
/// The argument vector is the configured `args`, then the words of the
/// normalized command, then the invocation's own arguments. The resolved
/// scope is passed through environment variables. A non-zero exit status
/// is an [`ExecutorError::Failed`].
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.program.clone()).with_args(config.args.iter().cloned())
    }

    /// Full argument vector for `invocation`.
    pub fn argv(&self, invocation: &Invocation) -> Vec<String> {
        self.args
            .iter()
            .cloned()
            .chain(invocation.command.split_whitespace().map(str::to_string))
            .chain(invocation.arguments.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecutorError> {
        let argv = self.argv(invocation);
        log::debug!("{}: spawning {} {:?}", invocation.correlation_id, self.program, argv);

        let output = Command::new(&self.program)
            .args(&argv)
            .env(ENV_CORRELATION_ID, &invocation.correlation_id)
            .env(ENV_PRINCIPAL, &invocation.principal)
            .env(ENV_ORG_ID, &invocation.scope.org_id)
            .env(ENV_WORKSPACE_ID, &invocation.scope.workspace_id)
            .env(ENV_SECRET_ACTIONS, invocation.secret_actions.join(","))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecutorError::Launch(format!("{}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ExecutorError::Failed {
                code: output.status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        Ok(ExecutionOutput {
            exit_code: output.status.code(),
            stdout,
            stderr,
        })
    }
}

/// Executor used when no program is configured: reports what would have
/// run and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl CommandExecutor for DryRunExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecutorError> {
        let mut line = format!("dry run: {} in {}", invocation.command, invocation.scope);
        for arg in &invocation.arguments {
            line.push(' ');
            line.push_str(arg);
        }
        log::info!("{}: {line}", invocation.correlation_id);
        Ok(ExecutionOutput::new(line))
    }
}
