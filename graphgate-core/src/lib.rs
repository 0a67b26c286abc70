//! # graphgate
//!
//! Governance gate for operators running mutating commands against a
//! marketing/social-graph API on behalf of many client accounts.
//!
//! Every command invocation passes through three checks before it may run:
//!
//! 1. **Authorization**: role bindings scoped to an org/workspace must grant
//!    the capability the command maps to ([`rbac`]).
//! 2. **Approval**: high-risk commands need a human-approved grant token whose
//!    fingerprint binds it to the exact principal, command, org and workspace
//!    ([`approval`]).
//! 3. **Secret governance**: an external hook must allow every secret action
//!    the invocation touches ([`secrets`]).
//!
//! The [`Orchestrator`] sequences these checks, records a decision audit event,
//! runs the command through a [`CommandExecutor`], and records an execution
//! event paired with the decision by correlation ID. Correlation IDs can be
//! claimed once, so a recorded decision can never be replayed.
//!
//! ## Quick Start
//!
//! ```rust
//! use graphgate_core::{GovernanceConfig, Governance};
//!
//! let config: GovernanceConfig = serde_json::from_value(serde_json::json!({
//!     "orgs": {
//!         "acme": {
//!             "id": "org_1",
//!             "default_workspace": "prod",
//!             "workspaces": { "prod": { "id": "ws_1" } }
//!         }
//!     },
//!     "roles": { "reader": { "capabilities": ["graph.read"] } },
//!     "bindings": [
//!         { "principal": "alice", "role": "reader", "org": "acme", "workspace": "prod" }
//!     ]
//! }))
//! .unwrap();
//!
//! let governance = Governance::from_config(&config).unwrap();
//! let trace = governance
//!     .authorize_command("alice", "meta api get", Some("acme"), "prod")
//!     .unwrap();
//! assert!(trace.allowed);
//! assert_eq!(trace.required_capability.as_deref(), Some("graph.read"));
//! ```
//!
//! ## Trust boundary
//!
//! Approval tokens are unsigned bearer credentials. Their integrity rests on
//! the fingerprint being recomputed at every step, and anyone holding valid
//! token bytes inside the TTL window can redeem them. The correlation-ID
//! replay guard in the audit sink is the only single-use enforcement.

pub mod approval;
pub mod audit;
pub mod clock;
pub mod command;
pub mod config;
pub mod directory;
pub mod error;
pub mod executor;
pub mod governance;
pub mod orchestrator;
pub mod rbac;
pub mod secrets;

pub use approval::{
    fingerprint, ApprovalContext, ApprovalDecision, ApprovalDenied, ApprovalError, ApprovalGate,
    ApprovalGateTrace, ApprovalGrant, ApprovalGrantClaims, ApprovalRequest,
    ApprovalRequestClaims, ApprovalStatus, ApprovalValidation, CodecError,
};
pub use audit::{
    AuditError, AuditEvent, AuditKind, AuditOutcome, AuditSink, AuditViolation, FileAuditSink,
    MemoryAuditSink,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{normalize_command, PolicyConfiguration};
pub use config::{
    BindingConfig, ConfigError, GovernanceConfig, OrgConfig, PolicyOverrides, RoleConfig,
    WorkspaceConfig,
};
pub use directory::{Directory, DirectoryError, Org, ResolvedWorkspace, Workspace};
pub use error::{GovernanceError, Result};
pub use executor::{CommandExecutor, ExecutionOutput, ExecutorError, Invocation};
pub use governance::Governance;
pub use orchestrator::{
    BuildError, ExecutionReport, ExecutionRequest, InvocationStage, Orchestrator,
    OrchestratorBuilder,
};
pub use rbac::{AuthorizationTrace, Authorizer, RoleBinding, RoleBindingStore};
pub use secrets::{ScopedSecretHook, SecretGovernanceError, SecretGovernanceHook, SecretGrant};
