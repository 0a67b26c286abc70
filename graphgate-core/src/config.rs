//! Structured governance configuration.
//!
//! These types are the already-parsed form of the operator's config file.
//! Reading and parsing the file itself happens in the CLI crate; everything
//! here is plain `serde` data plus the errors raised when the directory and
//! role-binding store are built from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Governance section of the configuration: tenants, roles, bindings and
/// command policy overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Org used when a workspace is given without an org.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_org: Option<String>,

    /// Orgs keyed by name.
    #[serde(default)]
    pub orgs: BTreeMap<String, OrgConfig>,

    /// Roles keyed by name.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,

    /// Role bindings.
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,

    /// Command table overrides.
    #[serde(default)]
    pub policy: PolicyOverrides,
}

/// An org and its workspaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Stable org identifier.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_workspace: Option<String>,

    /// Workspaces keyed by name.
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Stable workspace identifier.
    pub id: String,
}

/// A named capability bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Grant of a role to a principal within an org, optionally narrowed to one
/// workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub principal: String,
    pub role: String,
    pub org: String,

    /// Workspace scope. Omitted or empty means the binding applies to every
    /// workspace of the org.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

/// Overrides applied on top of the built-in command table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverrides {
    /// Extra or replacement `command -> capability` mappings.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,

    /// Replacement high-risk set. `None` keeps the built-in set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_risk_commands: Option<Vec<String>>,
}

/// Errors raised while building governance state from configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("org {0:?} must have a non-empty id")]
    MissingOrgId(String),

    #[error("workspace {workspace:?} in org {org:?} must have a non-empty id")]
    MissingWorkspaceId { org: String, workspace: String },

    #[error("default workspace {workspace:?} of org {org:?} does not exist")]
    UnknownDefaultWorkspace { org: String, workspace: String },

    #[error("default org {0:?} does not exist")]
    UnknownDefaultOrg(String),

    #[error("role {0:?} has a blank capability")]
    BlankRoleCapability(String),

    #[error("binding #{index} has a blank principal")]
    BlankPrincipal { index: usize },

    #[error("binding #{index} references unknown role {role:?}")]
    UnknownRole { index: usize, role: String },

    #[error("binding #{index} references unknown org {org:?}")]
    UnknownOrg { index: usize, org: String },

    #[error("binding #{index} references unknown workspace {workspace:?} in org {org:?}")]
    UnknownWorkspace {
        index: usize,
        org: String,
        workspace: String,
    },

    #[error("command {0:?} normalizes to an empty reference")]
    EmptyCommand(String),

    #[error("command {0:?} maps to a blank capability")]
    BlankCapability(String),

    #[error("high-risk command {0:?} has no capability mapping")]
    UnmappedHighRisk(String),
}
