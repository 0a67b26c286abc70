//! Common test utilities shared across test files.
#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use graphgate_cli::{App, CliConfig, DecisionPrompter, Format};
use graphgate_core::{ApprovalDecision, ApprovalRequestClaims, ManualClock};
use tempfile::TempDir;

pub fn config_toml(audit_path: &Path) -> String {
    format!(
        r#"
[orgs.acme]
id = "org_1001"
default_workspace = "prod"
[orgs.acme.workspaces.prod]
id = "ws_2001"
[orgs.acme.workspaces.staging]
id = "ws_2002"

[roles.reader]
capabilities = ["graph.read"]
[roles.rotator]
capabilities = ["auth.rotate"]

[[bindings]]
principal = "alice"
role = "reader"
org = "acme"
workspace = "prod"

[[bindings]]
principal = "carol"
role = "rotator"
org = "acme"

[[secrets.grants]]
org = "acme"
workspace = "prod"
actions = ["token.rotate"]

[audit]
path = "{}"
"#,
        audit_path.display()
    )
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

/// Answers every prompt with a fixed decision, or aborts with `None`.
pub struct FixedPrompter(pub Option<ApprovalDecision>);

impl DecisionPrompter for FixedPrompter {
    fn prompt(
        &self,
        _request: &ApprovalRequestClaims,
        _now: DateTime<Utc>,
    ) -> io::Result<Option<ApprovalDecision>> {
        Ok(self.0)
    }

    fn name(&self) -> &'static str {
        "FixedPrompter"
    }
}

pub struct TestApp {
    pub app: App,
    pub clock: Arc<ManualClock>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_prompter(FixedPrompter(Some(ApprovalDecision::Approved)))
    }

    pub fn with_prompter(prompter: FixedPrompter) -> Self {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::from_toml_str(&config_toml(&dir.path().join("audit.db"))).unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let app = App::new(config)
            .unwrap()
            .with_clock(clock.clone())
            .with_prompter(prompter);
        Self { app, clock, dir }
    }

    /// Parse `args` as a command line and run it, returning stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, graphgate_cli::CliError> {
        self.run_as(Format::Text, args).await
    }

    pub async fn run_json(&self, args: &[&str]) -> Result<serde_json::Value, graphgate_cli::CliError> {
        let out = self.run_as(Format::Json, args).await?;
        Ok(serde_json::from_str(&out).unwrap())
    }

    async fn run_as(
        &self,
        format: Format,
        args: &[&str],
    ) -> Result<String, graphgate_cli::CliError> {
        use clap::Parser;
        let cli = graphgate_cli::Cli::try_parse_from(
            std::iter::once("graphgate").chain(args.iter().copied()),
        )
        .unwrap();
        let mut out = Vec::new();
        self.app.run(cli.command, format, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }
}
