//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::CONFIG_ENV;

/// Governance gate for graph API operators.
#[derive(Debug, Parser)]
#[command(name = "graphgate", version, about, long_about = None)]
pub struct Cli {
    /// Config file [default: <config dir>/graphgate/config.toml]
    #[arg(long, global = true, env = CONFIG_ENV, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `graphgate_core=debug`
    #[arg(long, global = true, env = "GRAPHGATE_LOG", default_value = "warn")]
    pub log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List orgs and their workspaces
    Orgs,

    /// Resolve an org and workspace reference to stable IDs
    Resolve(ScopeArgs),

    /// Check whether a principal may run a command
    Authorize(ContextArgs),

    /// Request, grant, and validate approval tokens
    #[command(subcommand)]
    Approval(ApprovalCommand),

    /// Govern and run a command
    Exec(ExecArgs),

    /// List recorded audit events
    Audit(AuditArgs),
}

#[derive(Debug, Subcommand)]
pub enum ApprovalCommand {
    /// Mint a request token for a high-risk command
    Request(RequestArgs),

    /// Approve or reject a request token
    Grant(GrantArgs),

    /// Validate a grant token against a context
    Validate(ValidateArgs),
}

/// Org and workspace reference.
#[derive(Debug, Clone, Args)]
pub struct ScopeArgs {
    /// Org name. Optional with an `<org>/<workspace>` reference or a default org
    #[arg(long)]
    pub org: Option<String>,

    /// Workspace name, or `<org>/<workspace>`
    #[arg(long)]
    pub workspace: String,
}

/// Who runs what, where.
#[derive(Debug, Clone, Args)]
pub struct ContextArgs {
    #[arg(long, env = "GRAPHGATE_PRINCIPAL")]
    pub principal: String,

    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Command words, e.g. `-- auth rotate`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl ContextArgs {
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Request lifetime [default: approval.request_ttl]
    #[arg(long)]
    pub ttl: Option<humantime::Duration>,
}

#[derive(Debug, Clone, Args)]
pub struct GrantArgs {
    /// Request token
    #[arg(long)]
    pub token: String,

    #[arg(long)]
    pub approver: String,

    /// `approved` or `rejected`. Prompts when omitted
    #[arg(long)]
    pub decision: Option<String>,

    /// Grant lifetime [default: approval.grant_ttl]
    #[arg(long)]
    pub ttl: Option<humantime::Duration>,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Grant token
    #[arg(long)]
    pub token: String,

    #[command(flatten)]
    pub context: ContextArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ExecArgs {
    #[command(flatten)]
    pub context: ContextArgs,

    /// Grant token for a high-risk command
    #[arg(long, env = "GRAPHGATE_APPROVAL_TOKEN")]
    pub approval_token: Option<String>,

    /// Correlation ID [default: random UUID]
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Secret action the command performs (repeatable)
    #[arg(long = "secret-action", value_name = "ACTION")]
    pub secret_actions: Vec<String>,

    /// Argument passed to the executor after the command words (repeatable)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub arguments: Vec<String>,

    /// Run through governance without invoking the configured executor
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AuditArgs {
    /// Only events for this correlation ID
    #[arg(long)]
    pub correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::try_parse_from([
            "graphgate",
            "--json",
            "exec",
            "--principal",
            "carol",
            "--workspace",
            "acme/prod",
            "--secret-action",
            "token.rotate",
            "--arg",
            "--force",
            "--",
            "auth",
            "rotate",
        ])
        .unwrap();

        assert!(cli.json);
        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.context.principal, "carol");
        assert_eq!(args.context.scope.org, None);
        assert_eq!(args.context.command_line(), "auth rotate");
        assert_eq!(args.secret_actions, vec!["token.rotate"]);
        assert_eq!(args.arguments, vec!["--force"]);
        assert!(args.correlation_id.is_none());
    }

    #[test]
    fn test_parse_approval_request_ttl() {
        let cli = Cli::try_parse_from([
            "graphgate",
            "approval",
            "request",
            "--principal",
            "alice",
            "--org",
            "acme",
            "--workspace",
            "prod",
            "--ttl",
            "10m",
            "--",
            "auth",
            "rotate",
        ])
        .unwrap();

        let Command::Approval(ApprovalCommand::Request(args)) = cli.command else {
            panic!("expected approval request");
        };
        let ttl: std::time::Duration = args.ttl.unwrap().into();
        assert_eq!(ttl.as_secs(), 600);
    }

    #[test]
    fn test_command_words_are_required() {
        let result = Cli::try_parse_from([
            "graphgate",
            "authorize",
            "--principal",
            "alice",
            "--workspace",
            "prod",
        ]);
        assert!(result.is_err());
    }
}
