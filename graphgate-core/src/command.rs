//! Command references and the policy table that classifies them.
//!
//! A command reference is the operator-facing verb phrase, such as
//! `"meta api get"`. It is normalized before any lookup, fingerprinting or
//! auditing, so `"  meta api get "` and `"api get"` are the same command.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ConfigError, PolicyOverrides};

/// Prefix stripped from command references (the CLI binary name).
pub const COMMAND_PREFIX: &str = "meta ";

/// Normalize a command reference.
///
/// Surrounding whitespace is trimmed and a single leading `"meta "` prefix is
/// removed.
///
/// ```rust
/// use graphgate_core::normalize_command;
///
/// assert_eq!(normalize_command("  meta api get "), "api get");
/// assert_eq!(normalize_command("auth rotate"), "auth rotate");
/// ```
pub fn normalize_command(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(COMMAND_PREFIX)
        .map(str::trim)
        .unwrap_or(trimmed)
        .to_string()
}

const DEFAULT_CAPABILITIES: &[(&str, &str)] = &[
    ("api get", "graph.read"),
    ("api post", "graph.write"),
    ("api delete", "graph.write"),
    ("auth status", "auth.read"),
    ("auth rotate", "auth.rotate"),
    ("ads list", "ads.read"),
    ("ads create", "ads.write"),
    ("ads pause", "ads.write"),
    ("ads delete", "ads.write"),
    ("insights get", "insights.read"),
    ("ops report", "ops.read"),
];

const DEFAULT_HIGH_RISK: &[&str] = &["auth rotate", "api delete", "ads delete"];

/// Immutable command policy: which capability each command requires and
/// which commands need human approval.
///
/// One value is built per tenant configuration and shared (behind an `Arc`)
/// by the authorizer and the approval gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfiguration {
    capabilities: BTreeMap<String, String>,
    high_risk: BTreeSet<String>,
}

impl PolicyConfiguration {
    /// Build a policy from explicit tables.
    ///
    /// Command keys are normalized. Every high-risk command must also have a
    /// capability mapping.
    pub fn new<C, K, V, H, R>(capabilities: C, high_risk: H) -> Result<Self, ConfigError>
    where
        C: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        H: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let mut table = BTreeMap::new();
        for (command, capability) in capabilities {
            let (command, capability) = normalize_entry(command.as_ref(), capability.as_ref())?;
            table.insert(command, capability);
        }

        let mut risky = BTreeSet::new();
        for command in high_risk {
            let normalized = normalize_command(command.as_ref());
            if normalized.is_empty() {
                return Err(ConfigError::EmptyCommand(command.as_ref().to_string()));
            }
            if !table.contains_key(&normalized) {
                return Err(ConfigError::UnmappedHighRisk(normalized));
            }
            risky.insert(normalized);
        }

        Ok(Self {
            capabilities: table,
            high_risk: risky,
        })
    }

    /// Apply configuration overrides on top of this policy.
    ///
    /// `commands` entries extend or replace capability mappings; a present
    /// `high_risk_commands` list replaces the high-risk set.
    pub fn with_overrides(self, overrides: &PolicyOverrides) -> Result<Self, ConfigError> {
        let mut capabilities = self.capabilities;
        for (command, capability) in &overrides.commands {
            let (command, capability) = normalize_entry(command, capability)?;
            capabilities.insert(command, capability);
        }

        let high_risk: Vec<String> = match &overrides.high_risk_commands {
            Some(list) => list.clone(),
            None => self.high_risk.into_iter().collect(),
        };

        Self::new(capabilities, high_risk)
    }

    /// Capability required by a command, if the command is mapped.
    pub fn required_capability(&self, command: &str) -> Option<&str> {
        self.capabilities
            .get(&normalize_command(command))
            .map(String::as_str)
    }

    /// Whether a command requires an approval grant.
    pub fn is_high_risk(&self, command: &str) -> bool {
        self.high_risk.contains(&normalize_command(command))
    }

    /// All mapped commands with their capabilities, sorted by command.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.capabilities
            .iter()
            .map(|(c, cap)| (c.as_str(), cap.as_str()))
    }

    /// The high-risk command set, sorted.
    pub fn high_risk_commands(&self) -> impl Iterator<Item = &str> {
        self.high_risk.iter().map(String::as_str)
    }
}

impl Default for PolicyConfiguration {
    fn default() -> Self {
        Self {
            capabilities: DEFAULT_CAPABILITIES
                .iter()
                .map(|(c, cap)| (c.to_string(), cap.to_string()))
                .collect(),
            high_risk: DEFAULT_HIGH_RISK.iter().map(|c| c.to_string()).collect(),
        }
    }
}

fn normalize_entry(command: &str, capability: &str) -> Result<(String, String), ConfigError> {
    let normalized = normalize_command(command);
    if normalized.is_empty() {
        return Err(ConfigError::EmptyCommand(command.to_string()));
    }
    let capability = capability.trim();
    if capability.is_empty() {
        return Err(ConfigError::BlankCapability(normalized));
    }
    Ok((normalized, capability.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_prefix_and_whitespace() {
        assert_eq!(normalize_command("meta api get"), "api get");
        assert_eq!(normalize_command("   meta   api get  "), "api get");
        assert_eq!(normalize_command("api post"), "api post");
        // Only a leading prefix is stripped
        assert_eq!(normalize_command("api meta get"), "api meta get");
        assert_eq!(normalize_command("meta"), "meta");
        assert_eq!(normalize_command("   "), "");
    }

    #[test]
    fn test_default_table() {
        let policy = PolicyConfiguration::default();
        assert_eq!(policy.required_capability("api get"), Some("graph.read"));
        assert_eq!(policy.required_capability("meta api post"), Some("graph.write"));
        assert_eq!(policy.required_capability("api delete"), Some("graph.write"));
        assert_eq!(policy.required_capability("api patch"), None);

        assert!(policy.is_high_risk("auth rotate"));
        assert!(policy.is_high_risk("meta auth rotate"));
        assert!(!policy.is_high_risk("api get"));
    }

    #[test]
    fn test_default_high_risk_commands_are_mapped() {
        let policy = PolicyConfiguration::default();
        for command in policy.high_risk_commands() {
            assert!(policy.required_capability(command).is_some(), "{command}");
        }
    }

    #[test]
    fn test_new_rejects_unmapped_high_risk() {
        let err = PolicyConfiguration::new([("api get", "graph.read")], ["auth rotate"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnmappedHighRisk(c) if c == "auth rotate"));
    }

    #[test]
    fn test_new_rejects_blank_entries() {
        let err = PolicyConfiguration::new([("   ", "graph.read")], Vec::<&str>::new()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand(_)));

        let err = PolicyConfiguration::new([("api get", "  ")], Vec::<&str>::new()).unwrap_err();
        assert!(matches!(err, ConfigError::BlankCapability(c) if c == "api get"));
    }

    #[test]
    fn test_overrides_extend_table_and_replace_high_risk() {
        let overrides = PolicyOverrides {
            commands: [("meta insights export".to_string(), "insights.read".to_string())]
                .into_iter()
                .collect(),
            high_risk_commands: Some(vec!["api post".to_string()]),
        };

        let policy = PolicyConfiguration::default()
            .with_overrides(&overrides)
            .unwrap();

        assert_eq!(
            policy.required_capability("insights export"),
            Some("insights.read")
        );
        assert!(policy.is_high_risk("api post"));
        assert!(!policy.is_high_risk("auth rotate"));
    }

    #[test]
    fn test_overrides_without_high_risk_keep_defaults() {
        let policy = PolicyConfiguration::default()
            .with_overrides(&PolicyOverrides::default())
            .unwrap();
        assert_eq!(policy, PolicyConfiguration::default());
    }
}
