//! Top-level error type for graphgate
//!
//! Module errors are flattened here into the categories a caller acts on.

use thiserror::Error;

use crate::approval::{ApprovalDenied, ApprovalError, ApprovalGateTrace, ApprovalStatus};
use crate::audit::{AuditError, AuditViolation};
use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::executor::ExecutorError;
use crate::rbac::AuthorizationTrace;
use crate::secrets::SecretGovernanceError;

/// Top-level error type for governance operations
///
/// - [`GovernanceError::Validation`] / [`GovernanceError::Directory`] - fix the input
/// - [`GovernanceError::AuthorizationDenied`] - a role binding is missing
/// - `Approval*` - obtain (or refresh) an approval grant
/// - [`GovernanceError::SecretGovernanceDenied`] - secret policy refused an action
/// - [`GovernanceError::AuditInvariantViolation`] - the correlation ID was already used
/// - [`GovernanceError::AuditStorage`] / [`GovernanceError::Executor`] - infrastructure failed
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Blank or malformed input, rejected before any lookup
    #[error("invalid input: {0}")]
    Validation(String),

    /// Configuration could not be loaded into a directory or policy
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Org or workspace could not be resolved
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("authorization denied: {}", reason(&.0.deny_reason))]
    AuthorizationDenied(Box<AuthorizationTrace>),

    #[error("approval required: {}", reason(&.0.deny_reason))]
    ApprovalRequired(Box<ApprovalGateTrace>),

    #[error("approval invalid: {}", reason(&.0.deny_reason))]
    ApprovalInvalid(Box<ApprovalGateTrace>),

    #[error("approval expired: {}", reason(&.0.deny_reason))]
    ApprovalExpired(Box<ApprovalGateTrace>),

    #[error("approval fingerprint mismatch: {}", reason(&.0.deny_reason))]
    ApprovalFingerprintMismatch(Box<ApprovalGateTrace>),

    #[error("approval rejected: {}", reason(&.0.deny_reason))]
    ApprovalRejected(Box<ApprovalGateTrace>),

    /// Minting an approval token failed
    #[error("approval error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("secret governance denied: {reason}")]
    SecretGovernanceDenied {
        action: Option<String>,
        reason: String,
    },

    #[error("audit invariant violated: {0}")]
    AuditInvariantViolation(AuditViolation),

    #[error("audit storage failed: {0}")]
    AuditStorage(String),

    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),
}

fn reason(deny_reason: &Option<String>) -> &str {
    deny_reason.as_deref().unwrap_or("denied")
}

impl GovernanceError {
    /// Machine-checkable status code.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Config(_) => "config_error",
            Self::Directory(_) => "directory_error",
            Self::AuthorizationDenied(_) => "authorization_denied",
            Self::ApprovalRequired(_) => "approval_required",
            Self::ApprovalInvalid(_) => "approval_invalid",
            Self::ApprovalExpired(_) => "approval_expired",
            Self::ApprovalFingerprintMismatch(_) => "approval_fingerprint_mismatch",
            Self::ApprovalRejected(_) => "approval_rejected",
            Self::Approval(_) => "approval_error",
            Self::SecretGovernanceDenied { .. } => "secret_governance_denied",
            Self::AuditInvariantViolation(_) => "audit_invariant_violation",
            Self::AuditStorage(_) => "audit_storage_error",
            Self::Executor(_) => "executor_error",
        }
    }

    /// Returns true if this is an input validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Directory(_))
    }

    /// Returns true if authorization denied the command
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, Self::AuthorizationDenied(_))
    }

    /// Returns true if the approval gate denied the command
    pub fn is_approval_denied(&self) -> bool {
        self.approval_trace().is_some()
    }

    /// Returns true if this is a secret governance denial
    pub fn is_secret_denied(&self) -> bool {
        matches!(self, Self::SecretGovernanceDenied { .. })
    }

    /// Returns true if this is an audit pairing violation
    pub fn is_audit_violation(&self) -> bool {
        matches!(self, Self::AuditInvariantViolation(_))
    }

    /// Returns true if a governance check refused the invocation
    pub fn is_denial(&self) -> bool {
        self.is_authorization_denied()
            || self.is_approval_denied()
            || self.is_secret_denied()
            || self.is_audit_violation()
    }

    /// Returns true if the same call may succeed when retried unchanged
    ///
    /// Only audit storage failures qualify: nothing was recorded, so the
    /// correlation ID is still unclaimed. Denials never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuditStorage(_))
    }

    /// The approval gate trace, for approval denials.
    pub fn approval_trace(&self) -> Option<&ApprovalGateTrace> {
        match self {
            Self::ApprovalRequired(t)
            | Self::ApprovalInvalid(t)
            | Self::ApprovalExpired(t)
            | Self::ApprovalFingerprintMismatch(t)
            | Self::ApprovalRejected(t) => Some(&**t),
            _ => None,
        }
    }

    /// The authorization trace, for authorization denials.
    pub fn authorization_trace(&self) -> Option<&AuthorizationTrace> {
        match self {
            Self::AuthorizationDenied(t) => Some(&**t),
            _ => None,
        }
    }
}

impl From<AuthorizationTrace> for GovernanceError {
    fn from(trace: AuthorizationTrace) -> Self {
        Self::AuthorizationDenied(Box::new(trace))
    }
}

impl From<ApprovalDenied> for GovernanceError {
    fn from(denied: ApprovalDenied) -> Self {
        let trace = Box::new(denied.trace);
        match trace.status {
            ApprovalStatus::Required => Self::ApprovalRequired(trace),
            ApprovalStatus::Expired => Self::ApprovalExpired(trace),
            ApprovalStatus::FingerprintMismatch => Self::ApprovalFingerprintMismatch(trace),
            ApprovalStatus::Rejected => Self::ApprovalRejected(trace),
            ApprovalStatus::Invalid | ApprovalStatus::NotRequired | ApprovalStatus::Approved => {
                Self::ApprovalInvalid(trace)
            }
        }
    }
}

impl From<AuditError> for GovernanceError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::InvariantViolation(v) => Self::AuditInvariantViolation(v),
            AuditError::Storage(msg) => Self::AuditStorage(msg),
        }
    }
}

impl From<SecretGovernanceError> for GovernanceError {
    fn from(err: SecretGovernanceError) -> Self {
        let action = match &err {
            SecretGovernanceError::Denied { action, .. } => Some(action.clone()),
            SecretGovernanceError::Hook(_) => None,
        };
        Self::SecretGovernanceDenied {
            action,
            reason: err.to_string(),
        }
    }
}

/// Result type for governance operations
pub type Result<T> = std::result::Result<T, GovernanceError>;
