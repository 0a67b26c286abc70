//! Config file loading.
//!
//! The config file is TOML. Its top level is the governance section
//! (`orgs`, `roles`, `bindings`, `policy`, `default_org`) plus CLI-only
//! tables for secret grants, approval TTLs, the audit store, and the
//! executor.
//!
//! Environment variables are expanded in the file contents before parsing,
//! using `${VAR}` or `${VAR:-default}` syntax. Unset variables without a
//! default are left as written.

use std::path::{Path, PathBuf};

use graphgate_core::{GovernanceConfig, SecretGrant};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GRAPHGATE_CONFIG";

const DEFAULT_TTL: &str = "30m";

/// Parsed `graphgate` config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub governance: GovernanceConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    /// External program that runs approved commands. Absent means dry run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,
}

/// Grants backing the secret governance hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub grants: Vec<SecretGrant>,
}

/// Default TTLs, as humantime strings (`"30m"`, `"1h 30m"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default = "default_ttl")]
    pub request_ttl: String,

    #[serde(default = "default_ttl")]
    pub grant_ttl: String,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            request_ttl: default_ttl(),
            grant_ttl: default_ttl(),
        }
    }
}

impl ApprovalConfig {
    pub fn request_ttl(&self) -> Result<chrono::Duration, CliError> {
        parse_ttl("approval.request_ttl", &self.request_ttl)
    }

    pub fn grant_ttl(&self) -> Result<chrono::Duration, CliError> {
        parse_ttl("approval.grant_ttl", &self.grant_ttl)
    }
}

fn default_ttl() -> String {
    DEFAULT_TTL.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// SQLite database path. Defaults to [`default_audit_path`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Configured path with `~` expanded, or the default location.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => expand_tilde(path),
            None => default_audit_path(),
        }
    }
}

/// Program invoked for each approved command.
///
/// It receives `args`, then the command words, then the invocation's
/// trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl CliConfig {
    /// Parse config from TOML text, expanding environment variables first.
    pub fn from_toml_str(content: &str) -> Result<Self, CliError> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Load the config file at `path`.
    ///
    /// The path itself is expanded using shell expansion (e.g. `~/graphgate.toml`).
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let path = expand_tilde(path.as_ref());
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CliError::Config(format!("failed to read {}: {e}", path.display())))?;

        log::debug!("loaded config from {}", path.display());
        Self::from_toml_str(&content)
            .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from `path`, or from [`default_config_path`] when none is given.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, CliError> {
        match path {
            Some(path) => Self::load(path).await,
            None => {
                let path = default_config_path().ok_or_else(|| {
                    CliError::Config(format!(
                        "no config directory found; pass --config or set {CONFIG_ENV}"
                    ))
                })?;
                Self::load(path).await
            }
        }
    }
}

/// `<config_dir>/graphgate/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("graphgate").join("config.toml"))
}

/// `<data_local_dir>/graphgate/audit.db`, or `.graphgate/audit.db` in the
/// current directory when no data directory is known.
pub fn default_audit_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("graphgate"))
        .unwrap_or_else(|| PathBuf::from(".graphgate"))
        .join("audit.db")
}

fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).as_ref())
}

fn expand_env_vars(input: &str) -> String {
    shellexpand::env_with_context_no_errors(input, |name| std::env::var(name).ok()).into_owned()
}

fn parse_ttl(field: &str, value: &str) -> Result<chrono::Duration, CliError> {
    let std = humantime::parse_duration(value.trim())
        .map_err(|e| CliError::Config(format!("{field}: {e}")))?;
    chrono::Duration::from_std(std).map_err(|e| CliError::Config(format!("{field}: {e}")))
}
