//! Secret governance.
//!
//! Invocations may declare secret actions they need (for example
//! `token.rotate`). Before a decision is recorded, a [`SecretGovernanceHook`]
//! must allow every one of them in the resolved workspace. The orchestrator
//! treats a missing hook, a denial and a hook failure the same way: the
//! invocation is denied.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::directory::ResolvedWorkspace;

/// Errors from a secret governance hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretGovernanceError {
    #[error("secret action {action:?} is not allowed in {org}/{workspace}: {reason}")]
    Denied {
        action: String,
        org: String,
        workspace: String,
        reason: String,
    },

    #[error("secret governance hook failed: {0}")]
    Hook(String),
}

/// External authority over secret actions.
#[async_trait]
pub trait SecretGovernanceHook: Send + Sync {
    /// Allow or deny `action` for `principal` in `scope`.
    async fn authorize(
        &self,
        principal: &str,
        action: &str,
        scope: &ResolvedWorkspace,
    ) -> Result<(), SecretGovernanceError>;
}

/// One grant of secret actions to an org, or to a single workspace of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretGrant {
    pub org: String,
    /// Omit for every workspace of `org`.
    #[serde(default)]
    pub workspace: Option<String>,
    pub actions: Vec<String>,
}

/// A [`SecretGovernanceHook`] backed by a static list of grants.
///
/// An action is allowed when a grant for the scope's org (org-wide or for the
/// scope's workspace) lists it. The principal is not consulted; role bindings
/// already cover who may run the command.
#[derive(Debug, Clone, Default)]
pub struct ScopedSecretHook {
    grants: BTreeMap<(String, Option<String>), BTreeSet<String>>,
}

impl ScopedSecretHook {
    pub fn new(grants: impl IntoIterator<Item = SecretGrant>) -> Self {
        let mut map: BTreeMap<(String, Option<String>), BTreeSet<String>> = BTreeMap::new();
        for grant in grants {
            let workspace = grant
                .workspace
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty());
            map.entry((grant.org.trim().to_string(), workspace))
                .or_default()
                .extend(grant.actions.into_iter().map(|a| a.trim().to_string()));
        }
        Self { grants: map }
    }

    fn allows(&self, action: &str, scope: &ResolvedWorkspace) -> bool {
        let org_wide = (scope.org_name.clone(), None);
        let scoped = (scope.org_name.clone(), Some(scope.workspace_name.clone()));
        [org_wide, scoped]
            .iter()
            .filter_map(|key| self.grants.get(key))
            .any(|actions| actions.contains(action))
    }
}

#[async_trait]
impl SecretGovernanceHook for ScopedSecretHook {
    async fn authorize(
        &self,
        _principal: &str,
        action: &str,
        scope: &ResolvedWorkspace,
    ) -> Result<(), SecretGovernanceError> {
        if self.allows(action, scope) {
            Ok(())
        } else {
            Err(SecretGovernanceError::Denied {
                action: action.to_string(),
                org: scope.org_name.clone(),
                workspace: scope.workspace_name.clone(),
                reason: "no secret grant covers this action".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(workspace: &str) -> ResolvedWorkspace {
        ResolvedWorkspace {
            org_name: "acme".into(),
            org_id: "org_1".into(),
            workspace_name: workspace.into(),
            workspace_id: format!("ws_{workspace}"),
        }
    }

    fn hook() -> ScopedSecretHook {
        ScopedSecretHook::new(vec![
            SecretGrant {
                org: "acme".into(),
                workspace: Some("prod".into()),
                actions: vec!["token.rotate".into()],
            },
            SecretGrant {
                org: "acme".into(),
                workspace: None,
                actions: vec!["token.read".into()],
            },
        ])
    }

    #[tokio::test]
    async fn test_workspace_grant() {
        let hook = hook();
        assert!(hook.authorize("alice", "token.rotate", &scope("prod")).await.is_ok());
        let err = hook
            .authorize("alice", "token.rotate", &scope("staging"))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretGovernanceError::Denied { ref workspace, .. } if workspace == "staging"));
    }

    #[tokio::test]
    async fn test_org_wide_grant() {
        let hook = hook();
        assert!(hook.authorize("alice", "token.read", &scope("prod")).await.is_ok());
        assert!(hook.authorize("alice", "token.read", &scope("staging")).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_hook_denies_everything() {
        let hook = ScopedSecretHook::default();
        assert!(hook.authorize("alice", "token.read", &scope("prod")).await.is_err());
    }
}
