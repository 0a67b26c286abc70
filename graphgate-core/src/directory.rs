//! Org/workspace directory.
//!
//! Resolves operator-supplied org and workspace references into stable
//! identifiers. Resolution is exact: there is no fuzzy matching and no
//! fallback beyond the configured default org.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GovernanceConfig};

/// A workspace inside an org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub name: String,
    pub id: String,
}

/// A tenant org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Org {
    pub name: String,
    pub id: String,
    pub default_workspace: Option<String>,
    pub workspaces: BTreeMap<String, Workspace>,
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedWorkspace {
    pub org_name: String,
    pub org_id: String,
    pub workspace_name: String,
    pub workspace_id: String,
}

impl std::fmt::Display for ResolvedWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.org_name, self.workspace_name)
    }
}

/// Why a reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("workspace is required")]
    WorkspaceRequired,

    #[error("org is required")]
    OrgRequired,

    #[error("workspace reference {0:?} must have the form <org>/<workspace>")]
    MalformedReference(String),

    #[error("org {explicit:?} conflicts with workspace reference {reference:?}")]
    OrgConflict { explicit: String, reference: String },

    #[error("org {0:?} does not exist")]
    OrgNotFound(String),

    #[error("workspace {workspace:?} does not exist in org {org:?}")]
    WorkspaceNotFound { org: String, workspace: String },
}

/// Read-only index of orgs and workspaces.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    orgs: BTreeMap<String, Org>,
    default_org: Option<String>,
}

impl Directory {
    /// Build the directory, validating ids and defaults.
    pub fn from_config(config: &GovernanceConfig) -> Result<Self, ConfigError> {
        let mut orgs = BTreeMap::new();

        for (name, org) in &config.orgs {
            if org.id.trim().is_empty() {
                return Err(ConfigError::MissingOrgId(name.clone()));
            }

            let mut workspaces = BTreeMap::new();
            for (ws_name, ws) in &org.workspaces {
                if ws.id.trim().is_empty() {
                    return Err(ConfigError::MissingWorkspaceId {
                        org: name.clone(),
                        workspace: ws_name.clone(),
                    });
                }
                workspaces.insert(
                    ws_name.clone(),
                    Workspace {
                        name: ws_name.clone(),
                        id: ws.id.trim().to_string(),
                    },
                );
            }

            if let Some(default) = &org.default_workspace {
                if !workspaces.contains_key(default) {
                    return Err(ConfigError::UnknownDefaultWorkspace {
                        org: name.clone(),
                        workspace: default.clone(),
                    });
                }
            }

            orgs.insert(
                name.clone(),
                Org {
                    name: name.clone(),
                    id: org.id.trim().to_string(),
                    default_workspace: org.default_workspace.clone(),
                    workspaces,
                },
            );
        }

        if let Some(default) = &config.default_org {
            if !orgs.contains_key(default) {
                return Err(ConfigError::UnknownDefaultOrg(default.clone()));
            }
        }

        Ok(Self {
            orgs,
            default_org: config.default_org.clone(),
        })
    }

    /// Resolve an org/workspace pair.
    ///
    /// `workspace_ref` is either a bare workspace name, resolved inside
    /// `org_ref` (or the default org), or a compound `org/workspace`
    /// reference. When both an explicit org and a compound reference are
    /// given they must agree.
    pub fn resolve(
        &self,
        org_ref: Option<&str>,
        workspace_ref: &str,
    ) -> Result<ResolvedWorkspace, DirectoryError> {
        let workspace_ref = workspace_ref.trim();
        if workspace_ref.is_empty() {
            return Err(DirectoryError::WorkspaceRequired);
        }
        let explicit = org_ref.map(str::trim).filter(|o| !o.is_empty());

        let (org_name, workspace_name) = if workspace_ref.contains('/') {
            let (org_part, ws_part) = split_compound(workspace_ref)?;
            if let Some(explicit) = explicit {
                if explicit != org_part {
                    return Err(DirectoryError::OrgConflict {
                        explicit: explicit.to_string(),
                        reference: workspace_ref.to_string(),
                    });
                }
            }
            (org_part, ws_part)
        } else {
            let org = explicit
                .or(self.default_org.as_deref())
                .ok_or(DirectoryError::OrgRequired)?;
            (org, workspace_ref)
        };

        let org = self
            .orgs
            .get(org_name)
            .ok_or_else(|| DirectoryError::OrgNotFound(org_name.to_string()))?;
        let workspace =
            org.workspaces
                .get(workspace_name)
                .ok_or_else(|| DirectoryError::WorkspaceNotFound {
                    org: org.name.clone(),
                    workspace: workspace_name.to_string(),
                })?;

        Ok(ResolvedWorkspace {
            org_name: org.name.clone(),
            org_id: org.id.clone(),
            workspace_name: workspace.name.clone(),
            workspace_id: workspace.id.clone(),
        })
    }

    /// Look up an org by name.
    pub fn org(&self, name: &str) -> Option<&Org> {
        self.orgs.get(name)
    }

    /// All orgs, sorted by name.
    pub fn orgs(&self) -> impl Iterator<Item = &Org> {
        self.orgs.values()
    }

    /// The configured default org, if any.
    pub fn default_org(&self) -> Option<&str> {
        self.default_org.as_deref()
    }
}

fn split_compound(reference: &str) -> Result<(&str, &str), DirectoryError> {
    let malformed = || DirectoryError::MalformedReference(reference.to_string());

    let (org, workspace) = reference.split_once('/').ok_or_else(malformed)?;
    if workspace.contains('/') {
        return Err(malformed());
    }
    let (org, workspace) = (org.trim(), workspace.trim());
    if org.is_empty() || workspace.is_empty() {
        return Err(malformed());
    }
    Ok((org, workspace))
}
