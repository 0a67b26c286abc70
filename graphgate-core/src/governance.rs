//! The facade over the directory, the authorizer and the approval gate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::approval::{
    create_grant_token, create_request_token, validate_grant_token, ApprovalContext,
    ApprovalGate, ApprovalGrant, ApprovalRequest, ApprovalValidation,
};
use crate::clock::{Clock, SystemClock};
use crate::command::{normalize_command, PolicyConfiguration};
use crate::config::{ConfigError, GovernanceConfig};
use crate::directory::{Directory, ResolvedWorkspace};
use crate::error::{GovernanceError, Result};
use crate::rbac::{AuthorizationTrace, Authorizer, RoleBindingStore};

/// Loaded governance state.
///
/// Built once from configuration and read-only afterwards. Cloning is cheap.
#[derive(Clone)]
pub struct Governance {
    directory: Arc<Directory>,
    policy: Arc<PolicyConfiguration>,
    authorizer: Authorizer,
    gate: ApprovalGate,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Governance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governance")
            .field("directory", &self.directory)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Governance {
    /// Build governance state from configuration, with the system clock.
    ///
    /// # Errors
    ///
    /// Fails when the config references unknown roles, orgs or workspaces,
    /// or when the policy overrides are inconsistent.
    pub fn from_config(config: &GovernanceConfig) -> std::result::Result<Self, ConfigError> {
        let policy =
            Arc::new(PolicyConfiguration::default().with_overrides(&config.policy)?);
        let directory = Directory::from_config(config)?;
        let bindings = Arc::new(RoleBindingStore::from_config(config, &directory)?);
        log::debug!(
            "loaded {} orgs and {} role bindings",
            directory.orgs().count(),
            bindings.len()
        );

        Ok(Self {
            directory: Arc::new(directory),
            authorizer: Authorizer::new(Arc::clone(&policy), bindings),
            gate: ApprovalGate::new(Arc::clone(&policy)),
            policy,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn policy(&self) -> &PolicyConfiguration {
        &self.policy
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The current instant according to the configured clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolve an org and workspace reference.
    pub fn resolve_workspace(&self, org: Option<&str>, workspace: &str) -> Result<ResolvedWorkspace> {
        Ok(self.directory.resolve(org, workspace)?)
    }

    /// Check whether `principal` may run `command` in the referenced workspace.
    ///
    /// A denial is a successful call returning a trace with `allowed == false`;
    /// errors are reserved for invalid input and unresolvable references.
    pub fn authorize_command(
        &self,
        principal: &str,
        command: &str,
        org: Option<&str>,
        workspace: &str,
    ) -> Result<AuthorizationTrace> {
        require("principal", principal)?;
        require("command", &normalize_command(command))?;
        let scope = self.resolve_workspace(org, workspace)?;
        Ok(self.authorizer.authorize(principal, command, &scope))
    }

    /// Mint a request token for the referenced workspace.
    pub fn create_approval_request(
        &self,
        principal: &str,
        command: &str,
        org: Option<&str>,
        workspace: &str,
        ttl: Duration,
    ) -> Result<ApprovalRequest> {
        require("principal", principal)?;
        require("command", &normalize_command(command))?;
        let scope = self.resolve_workspace(org, workspace)?;
        let context = ApprovalContext::new(
            principal,
            command,
            &scope.org_name,
            &scope.workspace_name,
        );
        Ok(create_request_token(&context, ttl, self.now())?)
    }

    /// Turn a request token into a grant.
    pub fn create_approval_grant(
        &self,
        request_token: &str,
        approver: &str,
        decision: &str,
        ttl: Duration,
    ) -> Result<ApprovalGrant> {
        Ok(create_grant_token(
            request_token,
            approver,
            decision,
            ttl,
            self.now(),
        )?)
    }

    /// Validate a grant token against the referenced context.
    pub fn validate_approval_grant(
        &self,
        grant_token: &str,
        principal: &str,
        command: &str,
        org: Option<&str>,
        workspace: &str,
    ) -> Result<ApprovalValidation> {
        require("principal", principal)?;
        require("command", &normalize_command(command))?;
        let scope = self.resolve_workspace(org, workspace)?;
        let context = ApprovalContext::new(
            principal,
            command,
            &scope.org_name,
            &scope.workspace_name,
        );
        Ok(validate_grant_token(grant_token, &context, self.now()))
    }
}

/// Reject a blank identity field.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(GovernanceError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
