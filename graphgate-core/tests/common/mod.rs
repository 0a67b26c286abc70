//! Common test utilities shared across test files.
//!
//! Mock collaborators and a fixture tenant configuration.
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use graphgate_core::{
    CommandExecutor, ExecutionOutput, ExecutorError, Governance, GovernanceConfig, Invocation,
    ManualClock, MemoryAuditSink, Orchestrator, ResolvedWorkspace, SecretGovernanceError,
    SecretGovernanceHook,
};
use parking_lot::Mutex;

// ===== Fixture configuration =====

/// Two orgs: `acme` (prod, staging) and `globex` (main).
///
/// - alice: reader in acme/prod
/// - bob: reader + writer in acme/prod
/// - carol: rotator across all of acme (org-wide)
/// - dave: admin in globex/main
pub fn fixture_config() -> GovernanceConfig {
    serde_json::from_value(serde_json::json!({
        "orgs": {
            "acme": {
                "id": "org_1001",
                "default_workspace": "prod",
                "workspaces": {
                    "prod": { "id": "ws_2001" },
                    "staging": { "id": "ws_2002" }
                }
            },
            "globex": {
                "id": "org_1002",
                "workspaces": { "main": { "id": "ws_3001" } }
            }
        },
        "roles": {
            "reader": { "capabilities": ["graph.read"] },
            "writer": { "capabilities": ["graph.write"] },
            "rotator": { "capabilities": ["auth.rotate", "auth.read"] },
            "admin": { "capabilities": ["graph.read", "graph.write", "auth.rotate", "ads.write"] }
        },
        "bindings": [
            { "principal": "alice", "role": "reader", "org": "acme", "workspace": "prod" },
            { "principal": "bob", "role": "reader", "org": "acme", "workspace": "prod" },
            { "principal": "bob", "role": "writer", "org": "acme", "workspace": "prod" },
            { "principal": "carol", "role": "rotator", "org": "acme" },
            { "principal": "dave", "role": "admin", "org": "globex", "workspace": "main" }
        ]
    }))
    .expect("fixture config is valid")
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

/// Governance over the fixture config with a frozen clock.
pub fn governance() -> (Governance, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let governance = Governance::from_config(&fixture_config())
        .expect("fixture governance loads")
        .with_clock(clock.clone());
    (governance, clock)
}

// ===== Executors =====

/// Records every invocation and succeeds.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Invocation>>,
}

impl RecordingExecutor {
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecutorError> {
        self.calls.lock().push(invocation.clone());
        Ok(ExecutionOutput::new(format!("ran {}", invocation.command)))
    }
}

/// Always fails with a non-zero exit.
pub struct FailingExecutor;

#[async_trait]
impl CommandExecutor for FailingExecutor {
    async fn execute(&self, _invocation: &Invocation) -> Result<ExecutionOutput, ExecutorError> {
        Err(ExecutorError::Failed {
            code: Some(2),
            stderr: "upstream returned 500".to_string(),
        })
    }
}

// ===== Secret hooks =====

/// Allows every action.
pub struct AllowAllSecrets;

#[async_trait]
impl SecretGovernanceHook for AllowAllSecrets {
    async fn authorize(
        &self,
        _principal: &str,
        _action: &str,
        _scope: &ResolvedWorkspace,
    ) -> Result<(), SecretGovernanceError> {
        Ok(())
    }
}

/// Denies one named action and allows the rest.
pub struct DenySecret(pub &'static str);

#[async_trait]
impl SecretGovernanceHook for DenySecret {
    async fn authorize(
        &self,
        _principal: &str,
        action: &str,
        scope: &ResolvedWorkspace,
    ) -> Result<(), SecretGovernanceError> {
        if action == self.0 {
            Err(SecretGovernanceError::Denied {
                action: action.to_string(),
                org: scope.org_name.clone(),
                workspace: scope.workspace_name.clone(),
                reason: "vault policy forbids it".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Fails as if the secret service were unreachable.
pub struct UnreachableSecrets;

#[async_trait]
impl SecretGovernanceHook for UnreachableSecrets {
    async fn authorize(
        &self,
        _principal: &str,
        _action: &str,
        _scope: &ResolvedWorkspace,
    ) -> Result<(), SecretGovernanceError> {
        Err(SecretGovernanceError::Hook("connection refused".to_string()))
    }
}

// ===== Orchestrator harness =====

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub executor: Arc<RecordingExecutor>,
    pub audit: Arc<MemoryAuditSink>,
    pub clock: Arc<ManualClock>,
}

/// Orchestrator with a recording executor, an in-memory audit sink and the
/// given secret hook.
pub fn harness_with_hook(hook: Option<Arc<dyn SecretGovernanceHook>>) -> Harness {
    let (governance, clock) = governance();
    let executor = Arc::new(RecordingExecutor::default());
    let audit = Arc::new(MemoryAuditSink::new());

    let mut builder = Orchestrator::builder()
        .governance(governance)
        .shared_executor(executor.clone())
        .shared_audit_sink(audit.clone());
    if let Some(hook) = hook {
        builder = builder.shared_secret_hook(hook);
    }

    Harness {
        orchestrator: builder.build().expect("orchestrator builds"),
        executor,
        audit,
        clock,
    }
}

pub fn harness() -> Harness {
    harness_with_hook(Some(Arc::new(AllowAllSecrets)))
}
