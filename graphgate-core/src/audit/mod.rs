//! Append-only audit trail of governance decisions and executions.
//!
//! Every governed invocation produces one **decision** event and, when the
//! decision allowed it, one **execution** event with the same correlation ID.
//! Sinks enforce the pairing when an event is recorded:
//!
//! | Event | Rejected when |
//! |-------|---------------|
//! | decision | the correlation ID already has a decision |
//! | execution | no decision exists, the decision was a denial, or an execution was already recorded |
//!
//! The check and the insert happen under one lock (or one transaction), so
//! recording a decision atomically claims its correlation ID.

mod file;
mod memory;

pub use file::FileAuditSink;
pub use memory::MemoryAuditSink;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which stage an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Decision,
    Execution,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Decision => "decision",
            AuditKind::Execution => "execution",
        }
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(AuditKind::Decision),
            "execution" => Ok(AuditKind::Execution),
            other => Err(format!("unknown audit kind {other:?}")),
        }
    }
}

/// Outcome of a stage. Decisions are `allowed`/`denied`; executions are
/// `succeeded`/`failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Denied,
    Succeeded,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Allowed => "allowed",
            AuditOutcome::Denied => "denied",
            AuditOutcome::Succeeded => "succeeded",
            AuditOutcome::Failed => "failed",
        }
    }

    /// Whether this outcome belongs to events of `kind`.
    pub fn applies_to(&self, kind: AuditKind) -> bool {
        match kind {
            AuditKind::Decision => matches!(self, AuditOutcome::Allowed | AuditOutcome::Denied),
            AuditKind::Execution => {
                matches!(self, AuditOutcome::Succeeded | AuditOutcome::Failed)
            }
        }
    }
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allowed" => Ok(AuditOutcome::Allowed),
            "denied" => Ok(AuditOutcome::Denied),
            "succeeded" => Ok(AuditOutcome::Succeeded),
            "failed" => Ok(AuditOutcome::Failed),
            other => Err(format!("unknown audit outcome {other:?}")),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub correlation_id: String,
    pub principal: String,
    pub command: String,
    pub org: String,
    pub workspace: String,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
    /// Deny reason or executor error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_actions: Vec<String>,
}

impl AuditEvent {
    /// A decision event.
    pub fn decision(
        correlation_id: impl Into<String>,
        principal: impl Into<String>,
        command: impl Into<String>,
        org: impl Into<String>,
        workspace: impl Into<String>,
        outcome: AuditOutcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: AuditKind::Decision,
            correlation_id: correlation_id.into(),
            principal: principal.into(),
            command: command.into(),
            org: org.into(),
            workspace: workspace.into(),
            outcome,
            timestamp,
            reason: None,
            secret_actions: Vec::new(),
        }
    }

    /// The execution event paired with this event's correlation ID.
    pub fn execution_of(&self, outcome: AuditOutcome, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: AuditKind::Execution,
            outcome,
            timestamp,
            reason: None,
            ..self.clone()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_secret_actions(mut self, actions: Vec<String>) -> Self {
        self.secret_actions = actions;
        self
    }
}

/// A pairing rule an event would break.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditViolation {
    #[error("correlation ID {0:?} already has a decision event")]
    DuplicateDecision(String),

    #[error("correlation ID {0:?} has no decision event")]
    OrphanExecution(String),

    #[error("correlation ID {0:?} was denied and cannot be executed")]
    DeniedDecision(String),

    #[error("correlation ID {0:?} already has an execution event")]
    DuplicateExecution(String),

    #[error("outcome {outcome} is not valid for a {kind} event")]
    InvalidOutcome {
        kind: AuditKind,
        outcome: AuditOutcome,
    },
}

/// Errors from recording or reading audit events.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit invariant violated: {0}")]
    InvariantViolation(#[from] AuditViolation),

    #[error("audit storage failed: {0}")]
    Storage(String),
}

impl AuditError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        AuditError::Storage(err.to_string())
    }
}

/// Destination for audit events.
///
/// `record` must check the pairing rules and append the event atomically:
/// two concurrent decisions for one correlation ID must leave exactly one
/// recorded.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Check the pairing rules and append `event`.
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// All events in recording order.
    async fn events(&self) -> Result<Vec<AuditEvent>, AuditError>;

    /// Events for one correlation ID, in recording order.
    async fn events_for(&self, correlation_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .events()
            .await?
            .into_iter()
            .filter(|e| e.correlation_id == correlation_id)
            .collect())
    }
}

/// Pairing state shared by the in-process sinks.
#[derive(Debug, Default)]
pub(crate) struct PairingIndex {
    decisions: HashMap<String, AuditOutcome>,
    executed: HashSet<String>,
}

impl PairingIndex {
    pub(crate) fn check(&self, event: &AuditEvent) -> Result<(), AuditViolation> {
        if !event.outcome.applies_to(event.kind) {
            return Err(AuditViolation::InvalidOutcome {
                kind: event.kind,
                outcome: event.outcome,
            });
        }

        let cid = &event.correlation_id;
        match event.kind {
            AuditKind::Decision => {
                if self.decisions.contains_key(cid) {
                    return Err(AuditViolation::DuplicateDecision(cid.clone()));
                }
            }
            AuditKind::Execution => match self.decisions.get(cid) {
                None => return Err(AuditViolation::OrphanExecution(cid.clone())),
                Some(AuditOutcome::Allowed) => {
                    if self.executed.contains(cid) {
                        return Err(AuditViolation::DuplicateExecution(cid.clone()));
                    }
                }
                Some(_) => return Err(AuditViolation::DeniedDecision(cid.clone())),
            },
        }
        Ok(())
    }

    pub(crate) fn apply(&mut self, event: &AuditEvent) {
        match event.kind {
            AuditKind::Decision => {
                self.decisions
                    .insert(event.correlation_id.clone(), event.outcome);
            }
            AuditKind::Execution => {
                self.executed.insert(event.correlation_id.clone());
            }
        }
    }
}
