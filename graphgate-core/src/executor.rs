//! The seam to whatever actually runs a command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::directory::ResolvedWorkspace;

/// Everything an executor needs to run one governed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub correlation_id: String,
    pub principal: String,
    /// Normalized command reference, e.g. `auth rotate`.
    pub command: String,
    /// Extra arguments passed through untouched.
    #[serde(default)]
    pub arguments: Vec<String>,
    pub scope: ResolvedWorkspace,
    /// Secret actions the governance hook allowed for this invocation.
    #[serde(default)]
    pub secret_actions: Vec<String>,
}

/// What a successful execution produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to launch command: {0}")]
    Launch(String),

    #[error("command exited with status {}: {stderr}", .code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    Failed { code: Option<i32>, stderr: String },

    #[error("{0}")]
    Other(String),
}

/// Runs an authorized invocation.
///
/// Only called after the decision event has been recorded as allowed.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_display() {
        let err = ExecutorError::Failed {
            code: Some(3),
            stderr: "boom".into(),
        };
        assert_eq!(err.to_string(), "command exited with status 3: boom");

        let err = ExecutorError::Failed {
            code: None,
            stderr: "killed".into(),
        };
        assert_eq!(err.to_string(), "command exited with status unknown: killed");
    }
}
