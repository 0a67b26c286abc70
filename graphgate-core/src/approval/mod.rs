//! Two-step human approval for high-risk commands.
//!
//! A requester mints a **request token** bound to the exact
//! `(principal, command, org, workspace)` context. An approver turns it into a
//! **grant token** carrying their decision. At execution time the grant is
//! validated against the context being executed.
//!
//! ```text
//! create_request_token ──► request token ──► create_grant_token ──► grant token
//!                                                                      │
//!                        ApprovalGate::evaluate ◄── validate_grant_token ◄┘
//! ```
//!
//! # Fingerprints
//!
//! Every token embeds `hex(sha256(principal \n command \n org \n workspace))`.
//! The fingerprint is recomputed from the token's own fields when a grant is
//! issued and when it is validated, and compared with the fingerprint of the
//! caller's context. A token copied to another context never validates.
//!
//! # Wire format
//!
//! Tokens are base64url (no padding) JSON objects; see [`codec`]. They are
//! not signed, so the fingerprint check and the expiry are the only
//! integrity guarantees.

pub mod codec;
mod claims;
mod fingerprint;
mod gate;

pub use claims::{
    ApprovalDecision, ApprovalGrantClaims, ApprovalRequestClaims, GRANT_TOKEN_TYPE,
    REQUEST_TOKEN_TYPE,
};
pub use codec::{CodecError, TOKEN_VERSION};
pub use fingerprint::{fingerprint, ApprovalContext};
pub use gate::{
    create_grant_token, create_request_token, validate_grant_token, ApprovalDenied,
    ApprovalError, ApprovalGate, ApprovalGateTrace, ApprovalGrant, ApprovalRequest,
    ApprovalStatus, ApprovalValidation,
};
