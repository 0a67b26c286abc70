//! Role-binding index.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{ConfigError, GovernanceConfig};
use crate::directory::Directory;

/// A role granted to a principal in an org, optionally narrowed to one
/// workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleBinding {
    pub principal: String,
    pub role: String,
    pub org: String,
    /// `None` for an org-wide binding.
    pub workspace: Option<String>,
}

impl RoleBinding {
    /// Check if this binding covers every workspace of its org.
    pub fn is_org_wide(&self) -> bool {
        self.workspace.is_none()
    }

    /// Check if this binding applies to an org/workspace pair.
    pub fn matches(&self, org: &str, workspace: &str) -> bool {
        self.org == org
            && match &self.workspace {
                None => true,
                Some(ws) => ws == workspace,
            }
    }
}

/// Immutable `{principal, role, org, workspace} -> capabilities` index.
///
/// Built once at startup; every reference in a binding is checked against
/// the roles table and the [`Directory`] so a typo fails the load instead of
/// silently granting nothing.
#[derive(Debug, Clone, Default)]
pub struct RoleBindingStore {
    roles: BTreeMap<String, BTreeSet<String>>,
    bindings: HashMap<String, Vec<RoleBinding>>,
}

impl RoleBindingStore {
    /// Build the store from config.
    pub fn from_config(
        config: &GovernanceConfig,
        directory: &Directory,
    ) -> Result<Self, ConfigError> {
        let mut roles = BTreeMap::new();
        for (name, role) in &config.roles {
            let mut capabilities = BTreeSet::new();
            for capability in &role.capabilities {
                let capability = capability.trim();
                if capability.is_empty() {
                    return Err(ConfigError::BlankRoleCapability(name.clone()));
                }
                capabilities.insert(capability.to_string());
            }
            roles.insert(name.clone(), capabilities);
        }

        let mut bindings: HashMap<String, Vec<RoleBinding>> = HashMap::new();
        for (index, binding) in config.bindings.iter().enumerate() {
            let principal = binding.principal.trim();
            if principal.is_empty() {
                return Err(ConfigError::BlankPrincipal { index });
            }
            if !roles.contains_key(&binding.role) {
                return Err(ConfigError::UnknownRole {
                    index,
                    role: binding.role.clone(),
                });
            }
            let org = directory
                .org(&binding.org)
                .ok_or_else(|| ConfigError::UnknownOrg {
                    index,
                    org: binding.org.clone(),
                })?;

            let workspace = binding
                .workspace
                .as_deref()
                .map(str::trim)
                .filter(|ws| !ws.is_empty());
            if let Some(ws) = workspace {
                if !org.workspaces.contains_key(ws) {
                    return Err(ConfigError::UnknownWorkspace {
                        index,
                        org: org.name.clone(),
                        workspace: ws.to_string(),
                    });
                }
            }

            bindings
                .entry(principal.to_string())
                .or_default()
                .push(RoleBinding {
                    principal: principal.to_string(),
                    role: binding.role.clone(),
                    org: org.name.clone(),
                    workspace: workspace.map(str::to_string),
                });
        }

        Ok(Self { roles, bindings })
    }

    /// All bindings of `principal` that apply to `org/workspace`, both
    /// workspace-scoped and org-wide.
    pub fn bindings_for(&self, principal: &str, org: &str, workspace: &str) -> Vec<&RoleBinding> {
        self.bindings
            .get(principal)
            .map(|bindings| {
                bindings
                    .iter()
                    .filter(|b| b.matches(org, workspace))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Capabilities of a role.
    pub fn capabilities(&self, role: &str) -> Option<&BTreeSet<String>> {
        self.roles.get(role)
    }

    /// Union of capabilities across the given bindings.
    pub fn capability_union<'a>(
        &'a self,
        bindings: &[&RoleBinding],
    ) -> BTreeSet<&'a str> {
        bindings
            .iter()
            .filter_map(|b| self.roles.get(&b.role))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Number of bindings across all principals.
    pub fn len(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Check if there are no bindings at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
