//! CLI-specific error types

use graphgate_core::{AuditError, BuildError, ConfigError, GovernanceError};
use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    /// Governance error, including every denial
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// Config file could not be located, read, or parsed
    #[error("config error: {0}")]
    Config(String),

    /// Governance state could not be built from the config file
    #[error("invalid governance config: {0}")]
    Policy(#[from] ConfigError),

    /// Audit store could not be opened or read
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Orchestrator wiring error
    #[error("orchestrator setup failed: {0}")]
    Build(#[from] BuildError),

    /// Bad flag combination or value
    #[error("usage error: {0}")]
    Usage(String),

    /// IO error (filesystem, stdout, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Returns true if a governance check refused the operation, or the
    /// audit store refused a replayed correlation ID
    pub fn is_denial(&self) -> bool {
        match self {
            CliError::Governance(err) => err.is_denial(),
            CliError::Audit(AuditError::InvariantViolation(_)) => true,
            _ => false,
        }
    }

    /// Process exit code: 1 for denials, 2 for everything else.
    pub fn exit_code(&self) -> u8 {
        if self.is_denial() {
            1
        } else {
            2
        }
    }

    /// Machine-checkable status for JSON output.
    pub fn status(&self) -> &'static str {
        match self {
            CliError::Governance(err) => err.status(),
            CliError::Config(_) | CliError::Policy(_) => "config_error",
            CliError::Audit(AuditError::InvariantViolation(_)) => "audit_invariant_violation",
            CliError::Audit(AuditError::Storage(_)) => "audit_storage_error",
            CliError::Build(_) => "setup_error",
            CliError::Usage(_) => "usage_error",
            CliError::Io(_) | CliError::Serialization(_) => "io_error",
        }
    }
}
