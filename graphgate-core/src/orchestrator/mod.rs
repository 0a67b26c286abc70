//! Governed execution.
//!
//! [`Orchestrator::execute`] runs one command invocation through every check,
//! in a fixed order, and stops at the first denial:
//!
//! 1. identity inputs are validated (nothing is recorded for blank input)
//! 2. the workspace is resolved and the principal authorized
//! 3. the approval gate is evaluated
//! 4. the secret governance hook allows each requested secret action
//! 5. a decision event is recorded, allowed or denied
//! 6. only when allowed, the executor runs
//! 7. an execution event is recorded under the same correlation ID
//!
//! Recording the decision claims the correlation ID, so replaying an
//! invocation fails at step 5 and never reaches the executor.

mod builder;
mod stage;

pub use builder::{BuildError, OrchestratorBuilder};
pub use stage::InvocationStage;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalContext, ApprovalGateTrace};
use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::command::normalize_command;
use crate::directory::ResolvedWorkspace;
use crate::error::{GovernanceError, Result};
use crate::executor::{CommandExecutor, ExecutionOutput, Invocation};
use crate::governance::{require, Governance};
use crate::rbac::AuthorizationTrace;
use crate::secrets::{SecretGovernanceError, SecretGovernanceHook};

/// One command invocation to govern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub principal: String,
    pub command: String,
    /// Explicit org. May be omitted for a compound workspace reference or
    /// when a default org is configured.
    pub org: Option<String>,
    pub workspace: String,
    pub correlation_id: String,
    pub approval_token: Option<String>,
    pub secret_actions: Vec<String>,
    /// Passed to the executor untouched.
    pub arguments: Vec<String>,
}

impl ExecutionRequest {
    pub fn new(
        principal: impl Into<String>,
        command: impl Into<String>,
        workspace: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            command: command.into(),
            workspace: workspace.into(),
            correlation_id: correlation_id.into(),
            ..Default::default()
        }
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    pub fn with_approval_token(mut self, token: impl Into<String>) -> Self {
        self.approval_token = Some(token.into());
        self
    }

    pub fn with_secret_action(mut self, action: impl Into<String>) -> Self {
        self.secret_actions.push(action.into());
        self
    }

    pub fn with_secret_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }
}

/// Everything known about a completed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub correlation_id: String,
    pub stage: InvocationStage,
    pub scope: ResolvedWorkspace,
    pub authorization: AuthorizationTrace,
    pub approval: ApprovalGateTrace,
    pub secret_actions: Vec<String>,
    pub output: ExecutionOutput,
}

/// Sequences authorization, approval, secret governance and audit around a
/// [`CommandExecutor`].
pub struct Orchestrator {
    governance: Governance,
    executor: Arc<dyn CommandExecutor>,
    audit: Arc<dyn AuditSink>,
    secret_hook: Option<Arc<dyn SecretGovernanceHook>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("governance", &self.governance)
            .field("secret_hook", &self.secret_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Identity fields as they go into audit events.
struct Subject<'a> {
    correlation_id: &'a str,
    principal: &'a str,
    command: &'a str,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    pub fn has_secret_hook(&self) -> bool {
        self.secret_hook.is_some()
    }

    /// Govern and, if every check passes, execute one invocation.
    ///
    /// # Errors
    ///
    /// - [`GovernanceError::Validation`] for blank identity input (nothing recorded)
    /// - a denial error for authorization, approval, or secret governance
    ///   (a denied decision is recorded first)
    /// - [`GovernanceError::AuditInvariantViolation`] when the correlation ID
    ///   was already used
    /// - [`GovernanceError::Executor`] when the command fails (a failed
    ///   execution is recorded first)
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport> {
        let correlation_id = request.correlation_id.trim();
        let principal = request.principal.trim();
        let command = normalize_command(&request.command);
        let org_ref = request
            .org
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty());
        let workspace_ref = request.workspace.trim();

        require("correlation ID", correlation_id)?;
        require("principal", principal)?;
        require("command", &command)?;
        require("workspace", workspace_ref)?;
        log::debug!(
            "{correlation_id}: {} {command:?} for {principal:?}",
            InvocationStage::Received
        );

        let subject = Subject {
            correlation_id,
            principal,
            command: &command,
        };
        let secret_actions = normalize_actions(&request.secret_actions);

        let scope = match self.governance.resolve_workspace(org_ref, workspace_ref) {
            Ok(scope) => scope,
            Err(err) => {
                self.deny(
                    &subject,
                    org_ref.unwrap_or_default(),
                    workspace_ref,
                    &err.to_string(),
                )
                .await?;
                return Err(err);
            }
        };

        let authorization = self
            .governance
            .authorizer()
            .authorize(principal, &command, &scope);
        if !authorization.allowed {
            let reason = authorization.deny_reason.clone().unwrap_or_default();
            self.deny_in(&subject, &scope, &reason).await?;
            return Err(GovernanceError::from(authorization));
        }
        self.advance(correlation_id, InvocationStage::AuthorizationChecked);

        let context = ApprovalContext::new(
            principal,
            command.as_str(),
            scope.org_name.as_str(),
            scope.workspace_name.as_str(),
        );
        let approval = match self.governance.gate().evaluate(
            &context,
            request.approval_token.as_deref(),
            self.governance.now(),
        ) {
            Ok(trace) => trace,
            Err(denied) => {
                let reason = denied.to_string();
                self.deny_in(&subject, &scope, &reason).await?;
                return Err(denied.into());
            }
        };
        self.advance(correlation_id, InvocationStage::ApprovalChecked);

        if let Err(err) = self.check_secrets(principal, &secret_actions, &scope).await {
            self.deny_in(&subject, &scope, &err.to_string()).await?;
            return Err(err.into());
        }
        self.advance(correlation_id, InvocationStage::SecretGovernanceChecked);

        let decision = AuditEvent::decision(
            correlation_id,
            principal,
            command.as_str(),
            scope.org_name.as_str(),
            scope.workspace_name.as_str(),
            AuditOutcome::Allowed,
            self.governance.now(),
        )
        .with_secret_actions(secret_actions.clone());
        self.audit.record(decision.clone()).await?;
        self.advance(correlation_id, InvocationStage::DecisionRecorded);

        let invocation = Invocation {
            correlation_id: correlation_id.to_string(),
            principal: principal.to_string(),
            command: command.clone(),
            arguments: request.arguments.clone(),
            scope: scope.clone(),
            secret_actions: secret_actions.clone(),
        };
        let output = match self.executor.execute(&invocation).await {
            Ok(output) => output,
            Err(err) => {
                log::warn!("{correlation_id}: execution failed: {err}");
                let failed = decision
                    .execution_of(AuditOutcome::Failed, self.governance.now())
                    .with_reason(err.to_string());
                self.audit.record(failed).await?;
                return Err(err.into());
            }
        };
        self.advance(correlation_id, InvocationStage::Executed);

        let executed = decision.execution_of(AuditOutcome::Succeeded, self.governance.now());
        self.audit.record(executed).await?;
        let stage = self.advance(correlation_id, InvocationStage::ExecutionRecorded);

        Ok(ExecutionReport {
            correlation_id: correlation_id.to_string(),
            stage,
            scope,
            authorization,
            approval,
            secret_actions,
            output,
        })
    }

    fn advance(&self, correlation_id: &str, next: InvocationStage) -> InvocationStage {
        log::debug!("{correlation_id}: {next}");
        next
    }

    async fn check_secrets(
        &self,
        principal: &str,
        actions: &[String],
        scope: &ResolvedWorkspace,
    ) -> std::result::Result<(), SecretGovernanceError> {
        let Some(hook) = &self.secret_hook else {
            return Err(SecretGovernanceError::Hook(
                "no secret governance hook is configured".to_string(),
            ));
        };
        for action in actions {
            hook.authorize(principal, action, scope).await?;
        }
        Ok(())
    }

    async fn deny_in(
        &self,
        subject: &Subject<'_>,
        scope: &ResolvedWorkspace,
        reason: &str,
    ) -> Result<()> {
        self.deny(subject, &scope.org_name, &scope.workspace_name, reason)
            .await
    }

    /// Record a denied decision.
    async fn deny(
        &self,
        subject: &Subject<'_>,
        org: &str,
        workspace: &str,
        reason: &str,
    ) -> Result<()> {
        log::warn!(
            "{}: {} denied for {:?}: {reason}",
            subject.correlation_id,
            subject.command,
            subject.principal
        );
        let event = AuditEvent::decision(
            subject.correlation_id,
            subject.principal,
            subject.command,
            org,
            workspace,
            AuditOutcome::Denied,
            self.governance.now(),
        )
        .with_reason(reason);
        self.audit.record(event).await?;
        log::debug!("{}: {}", subject.correlation_id, InvocationStage::Denied);
        Ok(())
    }
}

/// Trim, drop blanks and deduplicate, keeping first-seen order.
fn normalize_actions(actions: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(actions.len());
    for action in actions.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        if !out.iter().any(|seen| seen == action) {
            out.push(action.to_string());
        }
    }
    out
}
