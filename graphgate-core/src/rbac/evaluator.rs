//! Command authorization.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::RoleBindingStore;
use crate::command::{normalize_command, PolicyConfiguration};
use crate::directory::ResolvedWorkspace;

/// Outcome of an authorization check.
///
/// A deny always carries a non-empty `deny_reason`. The same inputs always
/// produce the same trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationTrace {
    pub allowed: bool,
    pub required_capability: Option<String>,
    pub org_name: String,
    pub workspace_name: String,
    pub deny_reason: Option<String>,
    /// Roles from the principal's matching bindings, sorted and deduplicated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_roles: Vec<String>,
}

/// Authorizes commands against role bindings.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use graphgate_core::{
///     Authorizer, Directory, GovernanceConfig, PolicyConfiguration, RoleBindingStore,
/// };
///
/// let config: GovernanceConfig = serde_json::from_value(serde_json::json!({
///     "orgs": { "acme": { "id": "org_1", "workspaces": { "prod": { "id": "ws_1" } } } },
///     "roles": { "reader": { "capabilities": ["graph.read"] } },
///     "bindings": [{ "principal": "alice", "role": "reader", "org": "acme", "workspace": "prod" }]
/// }))
/// .unwrap();
/// let directory = Directory::from_config(&config).unwrap();
/// let store = RoleBindingStore::from_config(&config, &directory).unwrap();
/// let authorizer = Authorizer::new(Arc::new(PolicyConfiguration::default()), Arc::new(store));
///
/// let scope = directory.resolve(Some("acme"), "prod").unwrap();
/// assert!(authorizer.authorize("alice", "api get", &scope).allowed);
/// assert!(!authorizer.authorize("alice", "api post", &scope).allowed);
/// ```
#[derive(Debug, Clone)]
pub struct Authorizer {
    policy: Arc<PolicyConfiguration>,
    bindings: Arc<RoleBindingStore>,
}

impl Authorizer {
    pub fn new(policy: Arc<PolicyConfiguration>, bindings: Arc<RoleBindingStore>) -> Self {
        Self { policy, bindings }
    }

    /// Decide whether `principal` may run `command` in `scope`.
    pub fn authorize(
        &self,
        principal: &str,
        command: &str,
        scope: &ResolvedWorkspace,
    ) -> AuthorizationTrace {
        let principal = principal.trim();
        let command = normalize_command(command);
        let mut trace = AuthorizationTrace {
            allowed: false,
            required_capability: None,
            org_name: scope.org_name.clone(),
            workspace_name: scope.workspace_name.clone(),
            deny_reason: None,
            matched_roles: Vec::new(),
        };

        let Some(capability) = self.policy.required_capability(&command) else {
            trace.deny_reason = Some(format!(
                "command {:?} is not mapped to a capability",
                command
            ));
            log::warn!("authorization denied for {principal:?}: unmapped command {command:?}");
            return trace;
        };
        trace.required_capability = Some(capability.to_string());

        let bindings =
            self.bindings
                .bindings_for(principal, &scope.org_name, &scope.workspace_name);
        if bindings.is_empty() {
            trace.deny_reason = Some(format!(
                "principal {:?} has no role binding in {}; a binding granting {:?} is required",
                principal, scope, capability
            ));
            log::warn!("authorization denied for {principal:?} in {scope}: no binding");
            return trace;
        }

        let mut roles: Vec<String> = bindings.iter().map(|b| b.role.clone()).collect();
        roles.sort();
        roles.dedup();
        trace.matched_roles = roles;

        if self
            .bindings
            .capability_union(&bindings)
            .contains(capability)
        {
            trace.allowed = true;
            log::debug!("authorized {principal:?} for {command:?} ({capability}) in {scope}");
        } else {
            trace.deny_reason = Some(format!(
                "roles [{}] bound to principal {:?} in {} do not grant capability {:?}",
                trace.matched_roles.join(", "),
                principal,
                scope,
                capability
            ));
            log::warn!(
                "authorization denied for {principal:?} in {scope}: missing capability {capability}"
            );
        }
        trace
    }

    /// The command policy this authorizer consults.
    pub fn policy(&self) -> &PolicyConfiguration {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernanceConfig;
    use crate::directory::Directory;
    use serde_json::json;

    fn setup() -> (Authorizer, Directory) {
        let config: GovernanceConfig = serde_json::from_value(json!({
            "orgs": {
                "acme": {
                    "id": "org_1",
                    "workspaces": { "prod": { "id": "ws_1" }, "staging": { "id": "ws_2" } }
                }
            },
            "roles": {
                "reader": { "capabilities": ["graph.read"] },
                "writer": { "capabilities": ["graph.write"] },
                "rotator": { "capabilities": ["auth.rotate"] }
            },
            "bindings": [
                { "principal": "alice", "role": "reader", "org": "acme", "workspace": "prod" },
                { "principal": "bob", "role": "reader", "org": "acme", "workspace": "prod" },
                { "principal": "bob", "role": "writer", "org": "acme", "workspace": "prod" },
                { "principal": "carol", "role": "rotator", "org": "acme" }
            ]
        }))
        .unwrap();
        let directory = Directory::from_config(&config).unwrap();
        let store = RoleBindingStore::from_config(&config, &directory).unwrap();
        let authorizer = Authorizer::new(Arc::new(PolicyConfiguration::default()), Arc::new(store));
        (authorizer, directory)
    }

    fn scope(directory: &Directory, workspace: &str) -> ResolvedWorkspace {
        directory.resolve(Some("acme"), workspace).unwrap()
    }

    #[test]
    fn test_binding_with_capability_allows() {
        let (auth, dir) = setup();
        let trace = auth.authorize("alice", "meta api get", &scope(&dir, "prod"));
        assert!(trace.allowed);
        assert_eq!(trace.required_capability.as_deref(), Some("graph.read"));
        assert_eq!(trace.org_name, "acme");
        assert_eq!(trace.workspace_name, "prod");
        assert!(trace.deny_reason.is_none());
        assert_eq!(trace.matched_roles, vec!["reader"]);
    }

    #[test]
    fn test_role_lacking_capability_denies() {
        let (auth, dir) = setup();
        let trace = auth.authorize("alice", "api post", &scope(&dir, "prod"));
        assert!(!trace.allowed);
        assert_eq!(trace.required_capability.as_deref(), Some("graph.write"));
        let reason = trace.deny_reason.unwrap();
        assert!(reason.contains("do not grant capability \"graph.write\""), "{reason}");
        assert!(reason.contains("[reader]"), "{reason}");
    }

    #[test]
    fn test_no_binding_denies_with_distinct_reason() {
        let (auth, dir) = setup();
        let trace = auth.authorize("alice", "api get", &scope(&dir, "staging"));
        assert!(!trace.allowed);
        let reason = trace.deny_reason.unwrap();
        assert!(reason.contains("has no role binding in acme/staging"), "{reason}");

        let trace = auth.authorize("mallory", "api get", &scope(&dir, "prod"));
        assert!(!trace.allowed);
        assert!(trace.matched_roles.is_empty());
    }

    #[test]
    fn test_unmapped_command_denies() {
        let (auth, dir) = setup();
        let trace = auth.authorize("alice", "api patch", &scope(&dir, "prod"));
        assert!(!trace.allowed);
        assert!(trace.required_capability.is_none());
        assert_eq!(
            trace.deny_reason.as_deref(),
            Some("command \"api patch\" is not mapped to a capability")
        );
    }

    #[test]
    fn test_capabilities_union_across_bindings() {
        let (auth, dir) = setup();
        let prod = scope(&dir, "prod");
        assert!(auth.authorize("bob", "api get", &prod).allowed);
        let trace = auth.authorize("bob", "api delete", &prod);
        assert!(trace.allowed);
        assert_eq!(trace.matched_roles, vec!["reader", "writer"]);
    }

    #[test]
    fn test_org_wide_binding_applies_to_every_workspace() {
        let (auth, dir) = setup();
        assert!(auth.authorize("carol", "auth rotate", &scope(&dir, "prod")).allowed);
        assert!(auth.authorize("carol", "auth rotate", &scope(&dir, "staging")).allowed);
        assert!(!auth.authorize("carol", "api get", &scope(&dir, "staging")).allowed);
    }

    #[test]
    fn test_denials_are_deterministic() {
        let (auth, dir) = setup();
        let prod = scope(&dir, "prod");
        let first = auth.authorize("alice", "ads create", &prod);
        let second = auth.authorize("alice", "ads create", &prod);
        assert_eq!(first, second);
        assert!(!first.allowed);
    }
}
