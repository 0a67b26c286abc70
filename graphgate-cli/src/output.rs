//! Text and JSON rendering of command results.
//!
//! Text renderers return plain strings so the binary decides where they
//! go. JSON output is the `Serialize` form of the core types.

use std::io::Write;

use graphgate_core::{
    ApprovalGrant, ApprovalRequest, ApprovalValidation, AuditEvent, AuthorizationTrace,
    Directory, ExecutionReport, ResolvedWorkspace,
};
use serde::Serialize;
use serde_json::json;

use crate::error::CliError;

/// Output mode selected by `--json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Format::Json
        } else {
            Format::Text
        }
    }

    /// Write `value` as pretty JSON or `text`, followed by a newline.
    pub fn emit<T: Serialize>(
        &self,
        out: &mut impl Write,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> Result<(), CliError> {
        match self {
            Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?)?,
            Format::Text => writeln!(out, "{}", text())?,
        }
        Ok(())
    }
}

/// One row of `graphgate orgs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrgListing {
    pub name: String,
    pub id: String,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_workspace: Option<String>,
    pub workspaces: Vec<WorkspaceListing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceListing {
    pub name: String,
    pub id: String,
}

pub fn org_listing(directory: &Directory) -> Vec<OrgListing> {
    directory
        .orgs()
        .map(|org| OrgListing {
            name: org.name.clone(),
            id: org.id.clone(),
            default: directory.default_org() == Some(org.name.as_str()),
            default_workspace: org.default_workspace.clone(),
            workspaces: org
                .workspaces
                .values()
                .map(|ws| WorkspaceListing {
                    name: ws.name.clone(),
                    id: ws.id.clone(),
                })
                .collect(),
        })
        .collect()
}

pub fn render_orgs(orgs: &[OrgListing]) -> String {
    if orgs.is_empty() {
        return "no orgs configured".to_string();
    }
    let mut lines = Vec::new();
    for org in orgs {
        let marker = if org.default { " (default)" } else { "" };
        lines.push(format!("{}  {}{marker}", org.name, org.id));
        for ws in &org.workspaces {
            let marker = if org.default_workspace.as_deref() == Some(ws.name.as_str()) {
                " (default)"
            } else {
                ""
            };
            lines.push(format!("  {}  {}{marker}", ws.name, ws.id));
        }
    }
    lines.join("\n")
}

pub fn render_scope(scope: &ResolvedWorkspace) -> String {
    format!(
        "{scope}\n  org_id        {}\n  workspace_id  {}",
        scope.org_id, scope.workspace_id
    )
}

pub fn render_authorization(trace: &AuthorizationTrace) -> String {
    let verdict = if trace.allowed { "allowed" } else { "denied" };
    let mut lines = vec![format!(
        "{verdict} in {}/{}",
        trace.org_name, trace.workspace_name
    )];
    lines.push(format!(
        "  capability  {}",
        trace.required_capability.as_deref().unwrap_or("-")
    ));
    if !trace.matched_roles.is_empty() {
        lines.push(format!("  roles       {}", trace.matched_roles.join(", ")));
    }
    if let Some(reason) = &trace.deny_reason {
        lines.push(format!("  reason      {reason}"));
    }
    lines.join("\n")
}

pub fn render_request(request: &ApprovalRequest) -> String {
    format!(
        "{}\n  principal    {}\n  command      {}\n  workspace    {}/{}\n  fingerprint  {}\n  expires      {}",
        request.request_token,
        request.principal,
        request.normalized_command,
        request.org_name,
        request.workspace_name,
        request.fingerprint,
        request.expires_at.to_rfc3339(),
    )
}

pub fn render_grant(grant: &ApprovalGrant) -> String {
    format!(
        "{}\n  decision     {} by {}\n  command      {}\n  workspace    {}/{}\n  fingerprint  {}\n  expires      {}",
        grant.grant_token,
        grant.decision,
        grant.approver,
        grant.normalized_command,
        grant.org_name,
        grant.workspace_name,
        grant.fingerprint,
        grant.expires_at.to_rfc3339(),
    )
}

pub fn render_validation(validation: &ApprovalValidation) -> String {
    let mut lines = vec![format!(
        "{} ({})",
        if validation.valid { "valid" } else { "invalid" },
        validation.status
    )];
    if let Some(reason) = &validation.deny_reason {
        lines.push(format!("  reason       {reason}"));
    }
    if let Some(approver) = &validation.approver {
        lines.push(format!("  approver     {approver}"));
    }
    if let Some(expires_at) = validation.expires_at {
        lines.push(format!("  expires      {}", expires_at.to_rfc3339()));
    }
    lines.push(format!("  fingerprint  {}", validation.expected_fingerprint));
    lines.join("\n")
}

/// Executor output first, then a one-line summary.
pub fn render_execution(report: &ExecutionReport) -> String {
    let mut text = report.output.stdout.trim_end().to_string();
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&format!(
        "[{}] {} in {} ({})",
        report.correlation_id, report.stage, report.scope, report.approval.status
    ));
    text
}

pub fn render_events(events: &[AuditEvent]) -> String {
    if events.is_empty() {
        return "no audit events".to_string();
    }
    events
        .iter()
        .map(|e| {
            let mut line = format!(
                "{}  {:<9}  {:<9}  {}  {}  {}/{}  {}",
                e.timestamp.to_rfc3339(),
                e.kind,
                e.outcome,
                e.correlation_id,
                e.principal,
                e.org,
                e.workspace,
                e.command
            );
            if let Some(reason) = &e.reason {
                line.push_str(&format!("  ({reason})"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON body printed for a failed command.
pub fn error_json(err: &CliError) -> serde_json::Value {
    let mut body = json!({
        "status": err.status(),
        "error": err.to_string(),
    });
    if let CliError::Governance(gov) = err {
        if let Some(trace) = gov.authorization_trace() {
            body["authorization"] = json!(trace);
        }
        if let Some(trace) = gov.approval_trace() {
            body["approval"] = json!(trace);
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphgate_core::{GovernanceConfig, GovernanceError};

    fn directory() -> Directory {
        let config: GovernanceConfig = serde_json::from_value(json!({
            "default_org": "acme",
            "orgs": {
                "acme": {
                    "id": "org_1",
                    "default_workspace": "prod",
                    "workspaces": { "prod": { "id": "ws_1" }, "dev": { "id": "ws_2" } }
                },
                "globex": { "id": "org_2" }
            }
        }))
        .unwrap();
        Directory::from_config(&config).unwrap()
    }

    #[test]
    fn test_org_listing_is_sorted() {
        let orgs = org_listing(&directory());
        assert_eq!(orgs.len(), 2);
        assert_eq!(orgs[0].name, "acme");
        assert!(orgs[0].default);
        assert_eq!(orgs[0].workspaces[0].name, "dev");
        assert!(!orgs[1].default);

        let text = render_orgs(&orgs);
        assert!(text.starts_with("acme  org_1 (default)"));
        assert!(text.contains("  prod  ws_1 (default)"));
    }

    #[test]
    fn test_denied_authorization_text() {
        let trace = AuthorizationTrace {
            allowed: false,
            required_capability: Some("graph.write".into()),
            org_name: "acme".into(),
            workspace_name: "prod".into(),
            deny_reason: Some("role reader lacks graph.write".into()),
            matched_roles: vec!["reader".into()],
        };
        let text = render_authorization(&trace);
        assert!(text.starts_with("denied in acme/prod"));
        assert!(text.contains("roles       reader"));
        assert!(text.contains("reason      role reader lacks graph.write"));
    }

    #[test]
    fn test_emit_json() {
        let mut out = Vec::new();
        Format::Json
            .emit(&mut out, &json!({"ok": true}), || unreachable!())
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_error_json_carries_trace() {
        let trace = AuthorizationTrace {
            allowed: false,
            required_capability: None,
            org_name: "acme".into(),
            workspace_name: "prod".into(),
            deny_reason: Some("command \"api patch\" is not mapped".into()),
            matched_roles: vec![],
        };
        let err = CliError::from(GovernanceError::from(trace));
        let body = error_json(&err);
        assert_eq!(body["status"], "authorization_denied");
        assert_eq!(body["authorization"]["org_name"], "acme");
    }
}
