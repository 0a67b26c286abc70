//! Claim shapes carried inside approval tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::ApprovalContext;

pub const REQUEST_TOKEN_TYPE: &str = "approval_request";
pub const GRANT_TOKEN_TYPE: &str = "approval_grant";

/// An approver's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approved => "approved",
            ApprovalDecision::Rejected => "rejected",
        }
    }

    /// Parse an operator-supplied decision. Trims and ignores case; anything
    /// other than `approved` or `rejected` is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(ApprovalDecision::Approved),
            "rejected" => Some(ApprovalDecision::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims of a request token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequestClaims {
    pub version: u32,
    pub token_type: String,
    pub principal: String,
    pub command: String,
    pub org_name: String,
    pub workspace_name: String,
    pub fingerprint: String,
    pub requested_at: DateTime<Utc>,
    pub request_expires_at: DateTime<Utc>,
}

impl ApprovalRequestClaims {
    /// The context embedded in the claims, as written.
    pub fn context(&self) -> ApprovalContext {
        ApprovalContext::new(
            &self.principal,
            &self.command,
            &self.org_name,
            &self.workspace_name,
        )
    }
}

/// Claims of a grant token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGrantClaims {
    pub version: u32,
    pub token_type: String,
    pub principal: String,
    pub command: String,
    pub org_name: String,
    pub workspace_name: String,
    pub fingerprint: String,
    pub decision: ApprovalDecision,
    pub approver: String,
    pub approved_at: DateTime<Utc>,
    pub grant_expires_at: DateTime<Utc>,
}

impl ApprovalGrantClaims {
    /// The context embedded in the claims, as written.
    pub fn context(&self) -> ApprovalContext {
        ApprovalContext::new(
            &self.principal,
            &self.command,
            &self.org_name,
            &self.workspace_name,
        )
    }
}
