//! Context fingerprints.

use sha2::{Digest, Sha256};

use crate::command::normalize_command;

/// Compute the fingerprint of an already-normalized context.
///
/// `hex(sha256(principal + "\n" + command + "\n" + org + "\n" + workspace))`
pub fn fingerprint(principal: &str, command: &str, org: &str, workspace: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(principal.as_bytes());
    hasher.update(b"\n");
    hasher.update(command.as_bytes());
    hasher.update(b"\n");
    hasher.update(org.as_bytes());
    hasher.update(b"\n");
    hasher.update(workspace.as_bytes());
    hex::encode(hasher.finalize())
}

/// The four-field context an approval is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalContext {
    pub principal: String,
    pub command: String,
    pub org: String,
    pub workspace: String,
}

impl ApprovalContext {
    pub fn new(
        principal: impl Into<String>,
        command: impl Into<String>,
        org: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            command: command.into(),
            org: org.into(),
            workspace: workspace.into(),
        }
    }

    /// Trim every field and normalize the command reference.
    pub fn normalized(&self) -> Self {
        Self {
            principal: self.principal.trim().to_string(),
            command: normalize_command(&self.command),
            org: self.org.trim().to_string(),
            workspace: self.workspace.trim().to_string(),
        }
    }

    /// Name of the first blank field, if any (after normalization).
    pub fn blank_field(&self) -> Option<&'static str> {
        let normalized = self.normalized();
        [
            ("principal", normalized.principal.is_empty()),
            ("command", normalized.command.is_empty()),
            ("org", normalized.org.is_empty()),
            ("workspace", normalized.workspace.is_empty()),
        ]
        .into_iter()
        .find_map(|(name, blank)| blank.then_some(name))
    }

    /// Fingerprint of the normalized context.
    pub fn fingerprint(&self) -> String {
        let n = self.normalized();
        fingerprint(&n.principal, &n.command, &n.org, &n.workspace)
    }
}
