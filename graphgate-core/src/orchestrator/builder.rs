//! OrchestratorBuilder for fluent orchestrator construction

use std::sync::Arc;

use super::Orchestrator;
use crate::audit::AuditSink;
use crate::clock::Clock;
use crate::executor::CommandExecutor;
use crate::governance::Governance;
use crate::secrets::SecretGovernanceHook;

/// A required collaborator was not supplied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("orchestrator requires governance state")]
    MissingGovernance,

    #[error("orchestrator requires a command executor")]
    MissingExecutor,

    #[error("orchestrator requires an audit sink")]
    MissingAuditSink,
}

/// Builder for an [`Orchestrator`].
///
/// Governance, an executor and an audit sink are required. Without a secret
/// hook every invocation is denied at the secret governance step.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use graphgate_core::{
///     CommandExecutor, ExecutionOutput, ExecutorError, Governance, GovernanceConfig,
///     Invocation, MemoryAuditSink, Orchestrator,
/// };
///
/// struct Echo;
///
/// #[async_trait]
/// impl CommandExecutor for Echo {
///     async fn execute(&self, inv: &Invocation) -> Result<ExecutionOutput, ExecutorError> {
///         Ok(ExecutionOutput::new(inv.command.clone()))
///     }
/// }
///
/// let governance = Governance::from_config(&GovernanceConfig::default()).unwrap();
/// let orchestrator = Orchestrator::builder()
///     .governance(governance)
///     .executor(Echo)
///     .audit_sink(MemoryAuditSink::new())
///     .build()
///     .unwrap();
/// assert!(!orchestrator.has_secret_hook());
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    governance: Option<Governance>,
    executor: Option<Arc<dyn CommandExecutor>>,
    audit: Option<Arc<dyn AuditSink>>,
    secret_hook: Option<Arc<dyn SecretGovernanceHook>>,
    clock: Option<Arc<dyn Clock>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn governance(mut self, governance: Governance) -> Self {
        self.governance = Some(governance);
        self
    }

    pub fn executor(self, executor: impl CommandExecutor + 'static) -> Self {
        self.shared_executor(Arc::new(executor))
    }

    /// Use an executor the caller keeps a handle to.
    pub fn shared_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn audit_sink(self, sink: impl AuditSink + 'static) -> Self {
        self.shared_audit_sink(Arc::new(sink))
    }

    /// Use an audit sink the caller keeps a handle to.
    pub fn shared_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn secret_hook(self, hook: impl SecretGovernanceHook + 'static) -> Self {
        self.shared_secret_hook(Arc::new(hook))
    }

    pub fn shared_secret_hook(mut self, hook: Arc<dyn SecretGovernanceHook>) -> Self {
        self.secret_hook = Some(hook);
        self
    }

    /// Override the clock used for approval expiry and audit timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        let mut governance = self.governance.ok_or(BuildError::MissingGovernance)?;
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;
        let audit = self.audit.ok_or(BuildError::MissingAuditSink)?;
        if let Some(clock) = self.clock {
            governance = governance.with_clock(clock);
        }

        Ok(Orchestrator {
            governance,
            executor,
            audit,
            secret_hook: self.secret_hook,
        })
    }
}
