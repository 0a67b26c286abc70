//! Subcommand handlers.

use std::io::Write;
use std::sync::Arc;

use graphgate_core::approval::codec;
use graphgate_core::{
    ApprovalDenied, ApprovalError, ApprovalGateTrace, ApprovalRequestClaims, AuditSink, Clock,
    CommandExecutor, ExecutionRequest, Governance, GovernanceError, Orchestrator,
    ScopedSecretHook,
};

use crate::audit::SqliteAuditSink;
use crate::cli::{
    ApprovalCommand, AuditArgs, Command, ContextArgs, ExecArgs, GrantArgs, RequestArgs,
    ScopeArgs, ValidateArgs,
};
use crate::config::CliConfig;
use crate::error::CliError;
use crate::executor::{DryRunExecutor, ProcessExecutor};
use crate::output::{self, Format};
use crate::prompt::{DecisionPrompter, TerminalPrompter};

/// Loaded configuration plus the governance state built from it.
pub struct App {
    config: CliConfig,
    governance: Governance,
    prompter: Box<dyn DecisionPrompter>,
}

impl App {
    pub fn new(config: CliConfig) -> Result<Self, CliError> {
        let governance = Governance::from_config(&config.governance)?;
        Ok(Self {
            config,
            governance,
            prompter: Box::new(TerminalPrompter),
        })
    }

    /// Replace the interactive prompt used by `approval grant`.
    pub fn with_prompter(mut self, prompter: impl DecisionPrompter + 'static) -> Self {
        self.prompter = Box::new(prompter);
        self
    }

    /// Replace the governance clock, mainly for tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.governance = self.governance.with_clock(clock);
        self
    }

    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Run one subcommand, writing its result to `out`.
    pub async fn run(
        &self,
        command: Command,
        format: Format,
        out: &mut impl Write,
    ) -> Result<(), CliError> {
        match command {
            Command::Orgs => self.orgs(format, out),
            Command::Resolve(args) => self.resolve(&args, format, out),
            Command::Authorize(args) => self.authorize(&args, format, out),
            Command::Approval(ApprovalCommand::Request(args)) => self.request(&args, format, out),
            Command::Approval(ApprovalCommand::Grant(args)) => self.grant(&args, format, out),
            Command::Approval(ApprovalCommand::Validate(args)) => {
                self.validate(&args, format, out)
            }
            Command::Exec(args) => self.exec(args, format, out).await,
            Command::Audit(args) => self.audit(&args, format, out).await,
        }
    }

    fn orgs(&self, format: Format, out: &mut impl Write) -> Result<(), CliError> {
        let orgs = output::org_listing(self.governance.directory());
        format.emit(out, &orgs, || output::render_orgs(&orgs))
    }

    fn resolve(&self, args: &ScopeArgs, format: Format, out: &mut impl Write) -> Result<(), CliError> {
        let scope = self
            .governance
            .resolve_workspace(args.org.as_deref(), &args.workspace)?;
        format.emit(out, &scope, || output::render_scope(&scope))
    }

    fn authorize(
        &self,
        args: &ContextArgs,
        format: Format,
        out: &mut impl Write,
    ) -> Result<(), CliError> {
        let trace = self.governance.authorize_command(
            &args.principal,
            &args.command_line(),
            args.scope.org.as_deref(),
            &args.scope.workspace,
        )?;
        format.emit(out, &trace, || output::render_authorization(&trace))?;
        if trace.allowed {
            Ok(())
        } else {
            Err(GovernanceError::from(trace).into())
        }
    }

    fn request(&self, args: &RequestArgs, format: Format, out: &mut impl Write) -> Result<(), CliError> {
        let ttl = match &args.ttl {
            Some(ttl) => to_chrono(**ttl)?,
            None => self.config.approval.request_ttl()?,
        };
        let ctx = &args.context;
        let request = self.governance.create_approval_request(
            &ctx.principal,
            &ctx.command_line(),
            ctx.scope.org.as_deref(),
            &ctx.scope.workspace,
            ttl,
        )?;
        if !self.governance.gate().requires_approval(&request.normalized_command) {
            log::warn!(
                "{:?} is not high-risk; execution will not require this approval",
                request.normalized_command
            );
        }
        format.emit(out, &request, || output::render_request(&request))
    }

    fn grant(&self, args: &GrantArgs, format: Format, out: &mut impl Write) -> Result<(), CliError> {
        let ttl = match &args.ttl {
            Some(ttl) => to_chrono(**ttl)?,
            None => self.config.approval.grant_ttl()?,
        };
        let decision = match &args.decision {
            Some(decision) => decision.clone(),
            None => {
                let claims: ApprovalRequestClaims = codec::decode(&args.token)
                    .map_err(|e| GovernanceError::from(ApprovalError::from(e)))?;
                log::debug!("prompting with {}", self.prompter.name());
                match self.prompter.prompt(&claims, self.governance.now())? {
                    Some(decision) => decision.as_str().to_string(),
                    None => return Err(CliError::Usage("no decision given".into())),
                }
            }
        };

        let grant =
            self.governance
                .create_approval_grant(&args.token, &args.approver, &decision, ttl)?;
        format.emit(out, &grant, || output::render_grant(&grant))
    }

    fn validate(
        &self,
        args: &ValidateArgs,
        format: Format,
        out: &mut impl Write,
    ) -> Result<(), CliError> {
        let ctx = &args.context;
        let validation = self.governance.validate_approval_grant(
            &args.token,
            &ctx.principal,
            &ctx.command_line(),
            ctx.scope.org.as_deref(),
            &ctx.scope.workspace,
        )?;
        format.emit(out, &validation, || output::render_validation(&validation))?;
        if validation.valid {
            Ok(())
        } else {
            Err(GovernanceError::from(ApprovalDenied {
                trace: ApprovalGateTrace {
                    required: true,
                    status: validation.status,
                    deny_reason: validation.deny_reason.clone(),
                    fingerprint: validation.fingerprint.clone(),
                    decision: validation.decision,
                    approver: validation.approver.clone(),
                    expires_at: validation.expires_at,
                },
            })
            .into())
        }
    }

    async fn exec(&self, args: ExecArgs, format: Format, out: &mut impl Write) -> Result<(), CliError> {
        let correlation_id = args
            .correlation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if args.correlation_id.is_none() {
            eprintln!("correlation id: {correlation_id}");
        }

        let executor: Arc<dyn CommandExecutor> = match (&self.config.executor, args.dry_run) {
            (Some(config), false) => Arc::new(ProcessExecutor::from_config(config)),
            _ => Arc::new(DryRunExecutor),
        };
        let orchestrator = Orchestrator::builder()
            .governance(self.governance.clone())
            .shared_executor(executor)
            .shared_audit_sink(self.audit_sink()?)
            .secret_hook(ScopedSecretHook::new(self.config.secrets.grants.clone()))
            .build()?;

        let ctx = args.context;
        let mut request = ExecutionRequest::new(
            ctx.principal.clone(),
            ctx.command_line(),
            ctx.scope.workspace.clone(),
            correlation_id,
        )
        .with_secret_actions(args.secret_actions)
        .with_arguments(args.arguments);
        if let Some(org) = ctx.scope.org {
            request = request.with_org(org);
        }
        if let Some(token) = args.approval_token {
            request = request.with_approval_token(token);
        }

        let report = orchestrator.execute(request).await?;
        format.emit(out, &report, || output::render_execution(&report))
    }

    async fn audit(&self, args: &AuditArgs, format: Format, out: &mut impl Write) -> Result<(), CliError> {
        let sink = self.audit_sink()?;
        let events = match &args.correlation_id {
            Some(cid) => sink.events_for(cid.trim()).await?,
            None => sink.events().await?,
        };
        format.emit(out, &events, || output::render_events(&events))
    }

    fn audit_sink(&self) -> Result<Arc<dyn AuditSink>, CliError> {
        let path = self.config.audit.resolved_path();
        log::debug!("audit store at {}", path.display());
        Ok(Arc::new(SqliteAuditSink::new(path)?))
    }
}

fn to_chrono(ttl: std::time::Duration) -> Result<chrono::Duration, CliError> {
    chrono::Duration::from_std(ttl).map_err(|e| CliError::Usage(format!("--ttl: {e}")))
}
