//! Approval token lifecycle and the execution-time gate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::claims::{
    ApprovalDecision, ApprovalGrantClaims, ApprovalRequestClaims, GRANT_TOKEN_TYPE,
    REQUEST_TOKEN_TYPE,
};
use super::codec::{self, CodecError, TOKEN_VERSION};
use super::fingerprint::ApprovalContext;
use crate::command::PolicyConfiguration;

/// Where an approval stands for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    NotRequired,
    Required,
    Approved,
    Rejected,
    Expired,
    FingerprintMismatch,
    Invalid,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::NotRequired => "not_required",
            ApprovalStatus::Required => "required",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
            ApprovalStatus::FingerprintMismatch => "fingerprint_mismatch",
            ApprovalStatus::Invalid => "invalid",
        }
    }

    /// Whether execution may proceed.
    pub fn permits_execution(&self) -> bool {
        matches!(self, ApprovalStatus::NotRequired | ApprovalStatus::Approved)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hard failures while minting tokens.
///
/// Validation never fails this way; it reports a status instead.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("ttl must be positive")]
    NonPositiveTtl,

    #[error("ttl is out of range")]
    TtlOutOfRange,

    #[error("decision must be \"approved\" or \"rejected\", got {0:?}")]
    InvalidDecision(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("expected a {expected} token, got {found:?}")]
    WrongTokenType {
        expected: &'static str,
        found: String,
    },

    #[error("approval request expired at {0}")]
    RequestExpired(DateTime<Utc>),

    #[error("approval request fingerprint does not match its embedded context")]
    RequestTampered,
}

/// A freshly minted request token and the context it binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_token: String,
    pub fingerprint: String,
    pub principal: String,
    pub normalized_command: String,
    pub org_name: String,
    pub workspace_name: String,
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted grant token and the decision it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGrant {
    pub grant_token: String,
    pub fingerprint: String,
    pub decision: ApprovalDecision,
    pub approver: String,
    pub principal: String,
    pub normalized_command: String,
    pub org_name: String,
    pub workspace_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of validating a grant token against a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalValidation {
    pub valid: bool,
    pub status: ApprovalStatus,
    pub deny_reason: Option<String>,
    /// Fingerprint carried by the token, when it could be decoded.
    pub fingerprint: Option<String>,
    /// Fingerprint of the caller's context.
    pub expected_fingerprint: String,
    pub decision: Option<ApprovalDecision>,
    pub approver: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApprovalValidation {
    fn invalid(expected_fingerprint: String, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            status: ApprovalStatus::Invalid,
            deny_reason: Some(reason.into()),
            fingerprint: None,
            expected_fingerprint,
            decision: None,
            approver: None,
            expires_at: None,
        }
    }
}

/// What the gate decided for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGateTrace {
    pub required: bool,
    pub status: ApprovalStatus,
    pub deny_reason: Option<String>,
    pub fingerprint: Option<String>,
    pub decision: Option<ApprovalDecision>,
    pub approver: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The gate refused the invocation. The trace says why.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .trace.deny_reason.as_deref().unwrap_or("approval denied"))]
pub struct ApprovalDenied {
    pub trace: ApprovalGateTrace,
}

#[derive(Deserialize)]
struct TokenHeader {
    token_type: String,
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, ApprovalError> {
    if ttl <= Duration::zero() {
        return Err(ApprovalError::NonPositiveTtl);
    }
    now.checked_add_signed(ttl)
        .ok_or(ApprovalError::TtlOutOfRange)
}

/// Mint a request token for `context`.
///
/// # Errors
///
/// Fails if any context field is blank or `ttl` is not positive.
pub fn create_request_token(
    context: &ApprovalContext,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<ApprovalRequest, ApprovalError> {
    if let Some(field) = context.blank_field() {
        return Err(ApprovalError::MissingField(field));
    }
    let expires_at = expiry(now, ttl)?;
    let context = context.normalized();
    let fingerprint = context.fingerprint();

    let claims = ApprovalRequestClaims {
        version: TOKEN_VERSION,
        token_type: REQUEST_TOKEN_TYPE.to_string(),
        principal: context.principal.clone(),
        command: context.command.clone(),
        org_name: context.org.clone(),
        workspace_name: context.workspace.clone(),
        fingerprint: fingerprint.clone(),
        requested_at: now,
        request_expires_at: expires_at,
    };
    let request_token = codec::encode(&claims)?;
    log::debug!(
        "created approval request for {:?} running {:?} in {}/{}",
        context.principal,
        context.command,
        context.org,
        context.workspace
    );

    Ok(ApprovalRequest {
        request_token,
        fingerprint,
        principal: context.principal,
        normalized_command: context.command,
        org_name: context.org,
        workspace_name: context.workspace,
        expires_at,
    })
}

/// Turn a request token into a grant carrying `approver`'s decision.
///
/// The request must be unexpired at `now`, and its fingerprint must match the
/// one recomputed from its own fields.
pub fn create_grant_token(
    request_token: &str,
    approver: &str,
    decision: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<ApprovalGrant, ApprovalError> {
    let approver = approver.trim();
    if approver.is_empty() {
        return Err(ApprovalError::MissingField("approver"));
    }
    let decision = ApprovalDecision::parse(decision)
        .ok_or_else(|| ApprovalError::InvalidDecision(decision.to_string()))?;
    let expires_at = expiry(now, ttl)?;

    let header: TokenHeader = codec::decode(request_token)?;
    if header.token_type != REQUEST_TOKEN_TYPE {
        return Err(ApprovalError::WrongTokenType {
            expected: REQUEST_TOKEN_TYPE,
            found: header.token_type,
        });
    }
    let request: ApprovalRequestClaims = codec::decode(request_token)?;
    if now >= request.request_expires_at {
        return Err(ApprovalError::RequestExpired(request.request_expires_at));
    }

    let raw = request.context();
    if let Some(field) = raw.blank_field() {
        return Err(ApprovalError::MissingField(field));
    }
    let context = raw.normalized();
    let fingerprint = context.fingerprint();
    if fingerprint != request.fingerprint {
        log::warn!("rejected approval request whose fingerprint does not match its context");
        return Err(ApprovalError::RequestTampered);
    }

    let claims = ApprovalGrantClaims {
        version: TOKEN_VERSION,
        token_type: GRANT_TOKEN_TYPE.to_string(),
        principal: context.principal.clone(),
        command: context.command.clone(),
        org_name: context.org.clone(),
        workspace_name: context.workspace.clone(),
        fingerprint: fingerprint.clone(),
        decision,
        approver: approver.to_string(),
        approved_at: now,
        grant_expires_at: expires_at,
    };
    let grant_token = codec::encode(&claims)?;
    log::debug!(
        "{approver:?} {decision} {:?} for {:?} in {}/{}",
        context.command,
        context.principal,
        context.org,
        context.workspace
    );

    Ok(ApprovalGrant {
        grant_token,
        fingerprint,
        decision,
        approver: approver.to_string(),
        principal: context.principal,
        normalized_command: context.command,
        org_name: context.org,
        workspace_name: context.workspace,
        expires_at,
    })
}

/// Validate a grant token against the context about to execute.
///
/// Checks run in a fixed order: decoding and self-consistency (`invalid`),
/// then the caller's fingerprint (`fingerprint_mismatch`), then expiry
/// (`expired`), then the decision (`approved` or `rejected`).
pub fn validate_grant_token(
    grant_token: &str,
    context: &ApprovalContext,
    now: DateTime<Utc>,
) -> ApprovalValidation {
    let expected_fingerprint = context.fingerprint();

    let header: TokenHeader = match codec::decode(grant_token) {
        Ok(header) => header,
        Err(e) => {
            return ApprovalValidation::invalid(
                expected_fingerprint,
                format!("approval token could not be decoded: {e}"),
            )
        }
    };
    if header.token_type != GRANT_TOKEN_TYPE {
        return ApprovalValidation::invalid(
            expected_fingerprint,
            format!(
                "expected an {GRANT_TOKEN_TYPE} token, got {:?}",
                header.token_type
            ),
        );
    }
    let claims: ApprovalGrantClaims = match codec::decode(grant_token) {
        Ok(claims) => claims,
        Err(e) => {
            return ApprovalValidation::invalid(
                expected_fingerprint,
                format!("approval token could not be decoded: {e}"),
            )
        }
    };

    let mut validation = ApprovalValidation {
        valid: false,
        status: ApprovalStatus::Invalid,
        deny_reason: None,
        fingerprint: Some(claims.fingerprint.clone()),
        expected_fingerprint,
        decision: Some(claims.decision),
        approver: Some(claims.approver.clone()),
        expires_at: Some(claims.grant_expires_at),
    };

    if claims.context().fingerprint() != claims.fingerprint {
        validation.deny_reason =
            Some("approval grant fingerprint does not match its embedded context".to_string());
        return validation;
    }

    if claims.fingerprint != validation.expected_fingerprint {
        validation.status = ApprovalStatus::FingerprintMismatch;
        validation.deny_reason = Some(format!(
            "approval grant was issued for {:?} running {:?} in {}/{}, not this invocation",
            claims.principal, claims.command, claims.org_name, claims.workspace_name
        ));
        return validation;
    }

    if now >= claims.grant_expires_at {
        validation.status = ApprovalStatus::Expired;
        validation.deny_reason = Some(format!(
            "approval grant expired at {}",
            claims.grant_expires_at.to_rfc3339()
        ));
        return validation;
    }

    match claims.decision {
        ApprovalDecision::Approved => {
            validation.valid = true;
            validation.status = ApprovalStatus::Approved;
        }
        ApprovalDecision::Rejected => {
            validation.status = ApprovalStatus::Rejected;
            validation.deny_reason = Some(format!(
                "approval was rejected by {:?}",
                claims.approver
            ));
        }
    }
    validation
}

/// Decides whether an invocation may proceed with respect to approvals.
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    policy: Arc<PolicyConfiguration>,
}

impl ApprovalGate {
    pub fn new(policy: Arc<PolicyConfiguration>) -> Self {
        Self { policy }
    }

    /// Whether `command` needs an approval at all.
    pub fn requires_approval(&self, command: &str) -> bool {
        self.policy.is_high_risk(command)
    }

    /// Evaluate the gate for `context`.
    ///
    /// Commands that are not high-risk pass as `not_required` and the token
    /// is not inspected. Otherwise a missing or blank token is `required`,
    /// and any token that does not validate as approved is denied with the
    /// validation status.
    pub fn evaluate(
        &self,
        context: &ApprovalContext,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalGateTrace, ApprovalDenied> {
        let context = context.normalized();
        if !self.requires_approval(&context.command) {
            return Ok(ApprovalGateTrace {
                required: false,
                status: ApprovalStatus::NotRequired,
                deny_reason: None,
                fingerprint: None,
                decision: None,
                approver: None,
                expires_at: None,
            });
        }

        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            log::warn!("approval required for high-risk command {:?}", context.command);
            return Err(ApprovalDenied {
                trace: ApprovalGateTrace {
                    required: true,
                    status: ApprovalStatus::Required,
                    deny_reason: Some(format!(
                        "approval token is required for high-risk command {:?}",
                        context.command
                    )),
                    fingerprint: Some(context.fingerprint()),
                    decision: None,
                    approver: None,
                    expires_at: None,
                },
            });
        };

        let validation = validate_grant_token(token, &context, now);
        let trace = ApprovalGateTrace {
            required: true,
            status: validation.status,
            deny_reason: validation.deny_reason,
            fingerprint: validation
                .fingerprint
                .or(Some(validation.expected_fingerprint)),
            decision: validation.decision,
            approver: validation.approver,
            expires_at: validation.expires_at,
        };
        if validation.valid {
            log::debug!("approval accepted for {:?}", context.command);
            Ok(trace)
        } else {
            log::warn!(
                "approval {} for {:?}: {}",
                trace.status,
                context.command,
                trace.deny_reason.as_deref().unwrap_or_default()
            );
            Err(ApprovalDenied { trace })
        }
    }
}
