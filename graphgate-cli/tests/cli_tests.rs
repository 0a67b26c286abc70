mod common;

use chrono::Duration;
use common::{FixedPrompter, TestApp};
use graphgate_core::{ApprovalDecision, AuditSink};

// ===== Directory and authorization =====

#[tokio::test]
async fn test_orgs_lists_directory() {
    let t = TestApp::new();
    let text = t.run(&["orgs"]).await.unwrap();
    assert!(text.contains("acme  org_1001"));
    assert!(text.contains("  prod  ws_2001 (default)"));

    let json = t.run_json(&["orgs"]).await.unwrap();
    assert_eq!(json[0]["workspaces"][1]["id"], "ws_2002");
}

#[tokio::test]
async fn test_resolve_compound_reference() {
    let t = TestApp::new();
    let json = t
        .run_json(&["resolve", "--workspace", "acme/staging"])
        .await
        .unwrap();
    assert_eq!(json["org_id"], "org_1001");
    assert_eq!(json["workspace_id"], "ws_2002");
}

#[tokio::test]
async fn test_authorize_denial_is_an_error() {
    let t = TestApp::new();
    let ok = t
        .run(&[
            "authorize", "--principal", "alice", "--org", "acme", "--workspace", "prod", "--",
            "meta", "api", "get",
        ])
        .await
        .unwrap();
    assert!(ok.starts_with("allowed in acme/prod"));

    let err = t
        .run(&[
            "authorize", "--principal", "alice", "--org", "acme", "--workspace", "prod", "--",
            "api", "post",
        ])
        .await
        .unwrap_err();
    assert!(err.is_denial());
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_unknown_workspace_exits_with_two() {
    let t = TestApp::new();
    let err = t
        .run(&["resolve", "--org", "acme", "--workspace", "qa"])
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert_eq!(err.status(), "directory_error");
}

// ===== Approval flow =====

async fn request_token(t: &TestApp) -> String {
    let json = t
        .run_json(&[
            "approval", "request", "--principal", "carol", "--workspace", "acme/prod", "--",
            "auth", "rotate",
        ])
        .await
        .unwrap();
    json["request_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_request_grant_validate() {
    let t = TestApp::new();
    let request = request_token(&t).await;

    let grant = t
        .run_json(&[
            "approval", "grant", "--token", &request, "--approver", "bob", "--decision",
            "approved",
        ])
        .await
        .unwrap();
    assert_eq!(grant["decision"], "approved");
    let expires: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(grant["expires_at"].clone()).unwrap();
    assert_eq!(expires, common::start() + Duration::minutes(30));

    let token = grant["grant_token"].as_str().unwrap();
    let validation = t
        .run_json(&[
            "approval", "validate", "--token", token, "--principal", "carol", "--org", "acme",
            "--workspace", "prod", "--", "auth", "rotate",
        ])
        .await
        .unwrap();
    assert_eq!(validation["valid"], true);
    assert_eq!(validation["status"], "approved");

    let err = t
        .run(&[
            "approval", "validate", "--token", token, "--principal", "carol", "--org", "acme",
            "--workspace", "staging", "--", "auth", "rotate",
        ])
        .await
        .unwrap_err();
    assert_eq!(err.status(), "approval_fingerprint_mismatch");
}

#[tokio::test]
async fn test_grant_prompts_without_decision() {
    let t = TestApp::with_prompter(FixedPrompter(Some(ApprovalDecision::Rejected)));
    let request = request_token(&t).await;
    let grant = t
        .run_json(&["approval", "grant", "--token", &request, "--approver", "bob"])
        .await
        .unwrap();
    assert_eq!(grant["decision"], "rejected");

    let aborted = TestApp::with_prompter(FixedPrompter(None));
    let request = request_token(&aborted).await;
    let err = aborted
        .run(&["approval", "grant", "--token", &request, "--approver", "bob"])
        .await
        .unwrap_err();
    assert_eq!(err.status(), "usage_error");
}

#[tokio::test]
async fn test_request_ttl_flag_overrides_config() {
    let t = TestApp::new();
    let json = t
        .run_json(&[
            "approval", "request", "--principal", "carol", "--workspace", "acme/prod", "--ttl",
            "5m", "--", "auth", "rotate",
        ])
        .await
        .unwrap();
    let expires: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(json["expires_at"].clone()).unwrap();
    assert_eq!(expires, common::start() + Duration::minutes(5));
}

// ===== Governed execution =====

#[tokio::test]
async fn test_exec_dry_run_records_audit_pair() {
    let t = TestApp::new();
    let text = t
        .run(&[
            "exec", "--principal", "alice", "--workspace", "acme/prod", "--correlation-id",
            "c-1", "--arg", "/me", "--", "api", "get",
        ])
        .await
        .unwrap();
    assert!(text.contains("dry run: api get in acme/prod /me"));
    assert!(text.contains("[c-1] execution_recorded"));

    let events = t.run_json(&["audit", "--correlation-id", "c-1"]).await.unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["kind"], "decision");
    assert_eq!(events[1]["outcome"], "succeeded");
}

#[tokio::test]
async fn test_exec_replay_is_rejected_across_sink_instances() {
    let t = TestApp::new();
    let args = [
        "exec", "--principal", "alice", "--workspace", "acme/prod", "--correlation-id",
        "c-replay", "--", "api", "get",
    ];
    t.run(&args).await.unwrap();
    let err = t.run(&args).await.unwrap_err();
    assert_eq!(err.status(), "audit_invariant_violation");
    assert_eq!(err.exit_code(), 1);

    let sink = graphgate_cli::SqliteAuditSink::new(t.dir.path().join("audit.db")).unwrap();
    assert_eq!(sink.events_for("c-replay").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_exec_high_risk_with_grant_and_secret_action() {
    let t = TestApp::new();
    let request = request_token(&t).await;
    let grant = t
        .run_json(&[
            "approval", "grant", "--token", &request, "--approver", "bob", "--decision",
            "approved",
        ])
        .await
        .unwrap();
    let token = grant["grant_token"].as_str().unwrap();

    let report = t
        .run_json(&[
            "exec", "--principal", "carol", "--workspace", "acme/prod", "--approval-token",
            token, "--secret-action", "token.rotate", "--correlation-id", "c-rotate", "--",
            "auth", "rotate",
        ])
        .await
        .unwrap();
    assert_eq!(report["approval"]["status"], "approved");
    assert_eq!(report["secret_actions"][0], "token.rotate");
}

#[tokio::test]
async fn test_exec_ungranted_secret_action_is_denied() {
    let t = TestApp::new();
    let err = t
        .run(&[
            "exec", "--principal", "alice", "--workspace", "acme/prod", "--secret-action",
            "token.export", "--correlation-id", "c-secret", "--", "api", "get",
        ])
        .await
        .unwrap_err();
    assert!(err.is_denial());
    assert_eq!(err.status(), "secret_governance_denied");

    let events = t.run_json(&["audit", "--correlation-id", "c-secret"]).await.unwrap();
    assert_eq!(events[0]["outcome"], "denied");
}

#[tokio::test]
async fn test_exec_high_risk_without_grant_is_denied() {
    let t = TestApp::new();
    let err = t
        .run(&[
            "exec", "--principal", "carol", "--workspace", "acme/prod", "--", "auth", "rotate",
        ])
        .await
        .unwrap_err();
    assert_eq!(err.status(), "approval_required");
}

#[tokio::test]
async fn test_audit_empty() {
    let t = TestApp::new();
    assert_eq!(t.run(&["audit"]).await.unwrap().trim(), "no audit events");
}
