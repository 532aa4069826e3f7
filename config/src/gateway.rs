//! Gateway configuration file
//!
//! ```toml
//! [server]
//! name = "cloudgate"
//! environment = "production"
//!
//! [confirmation]
//! timeout_secs = 300
//! max_pending = 100
//! bypass_environments = ["test", "development"]
//!
//! [sanitize]
//! sensitive_keys = ["password", "secret", "token", "apikey"]
//! max_value_length = 200
//!
//! [audit]
//! log_path = "/var/log/cloudgate/audit.jsonl"
//! memory_entries = 1000
//!
//! [[policies]]
//! tool = "delete_iso"
//! severity = "high"
//! category = "Storage Operations"
//! description = "Delete an uploaded ISO image"
//! warning_message = "Instances booting from this ISO will fail to boot"
//! required_confirmation = "delete iso"
//! impact_scope = "single-resource"
//! ```

use crate::{ConfigError, Result};
use cloudgate_guard::request::MAX_CONFIRMATION_TIMEOUT;
use cloudgate_guard::sanitize::{DEFAULT_MAX_VALUE_LENGTH, DEFAULT_SENSITIVE_KEYS};
use cloudgate_guard::{
    ActionPolicy, ActionPolicyRegistry, GuardSettings, ImpactScope, Sanitizer, Severity,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub confirmation: ConfirmationConfig,
    pub sanitize: SanitizeConfig,
    pub audit: AuditConfig,
    pub policies: Vec<PolicyOverride>,
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name reported to clients
    pub name: String,

    /// Environment assumed when a caller does not declare one
    pub environment: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "cloudgate".to_string(),
            environment: None,
        }
    }
}

/// `[confirmation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Seconds a confirmation stays answerable
    pub timeout_secs: u64,

    /// Maximum number of live pending confirmations
    pub max_pending: usize,

    /// Environments that skip confirmation
    pub bypass_environments: Vec<String>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        let defaults = GuardSettings::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            max_pending: defaults.max_pending,
            bypass_environments: defaults.bypass_environments,
        }
    }
}

/// `[sanitize]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Key fragments whose values are redacted
    pub sensitive_keys: Vec<String>,

    /// Maximum displayed string length
    pub max_value_length: usize,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            sensitive_keys: DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
        }
    }
}

/// `[audit]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines audit log; disabled when unset
    pub log_path: Option<PathBuf>,

    /// Events kept in memory for `confirmations/list`
    pub memory_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            memory_entries: cloudgate_guard::audit::DEFAULT_MEMORY_ENTRIES,
        }
    }
}

/// `[[policies]]`: adds a guarded tool or replaces a built-in policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverride {
    pub tool: String,
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub warning_message: String,
    pub required_confirmation: String,
    #[serde(default)]
    pub reversible: bool,
    pub impact_scope: ImpactScope,
}

impl PolicyOverride {
    pub fn to_policy(&self) -> ActionPolicy {
        ActionPolicy::new(
            self.severity,
            self.category.clone(),
            self.description.clone(),
            self.warning_message.clone(),
            self.required_confirmation.clone(),
            self.reversible,
            self.impact_scope,
        )
    }
}

impl GatewayConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check for values the guard cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            return Err(ConfigError::Invalid("server.name is empty".to_string()));
        }
        if self.confirmation.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "confirmation.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.confirmation.timeout_secs > MAX_CONFIRMATION_TIMEOUT.as_secs() {
            return Err(ConfigError::Invalid(format!(
                "confirmation.timeout_secs must be at most {}",
                MAX_CONFIRMATION_TIMEOUT.as_secs()
            )));
        }
        if self.confirmation.max_pending == 0 {
            return Err(ConfigError::Invalid(
                "confirmation.max_pending must be greater than zero".to_string(),
            ));
        }
        if self.sanitize.max_value_length == 0 {
            return Err(ConfigError::Invalid(
                "sanitize.max_value_length must be greater than zero".to_string(),
            ));
        }
        if self.audit.memory_entries == 0 {
            return Err(ConfigError::Invalid(
                "audit.memory_entries must be greater than zero".to_string(),
            ));
        }

        if let Some(env) = &self.server.environment {
            let env = env.trim().to_lowercase();
            if self
                .confirmation
                .bypass_environments
                .iter()
                .any(|b| b.trim().to_lowercase() == env)
            {
                tracing::warn!(
                    environment = %env,
                    "Default environment is a bypass environment: dangerous tools run unconfirmed"
                );
            }
        }

        // Building the registry rejects empty tools and phrases
        self.registry()?;
        Ok(())
    }

    /// Settings for the confirmation guard.
    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            timeout: Duration::from_secs(self.confirmation.timeout_secs),
            max_pending: self.confirmation.max_pending,
            bypass_environments: self.confirmation.bypass_environments.clone(),
            sanitizer: Sanitizer::new(
                &self.sanitize.sensitive_keys,
                self.sanitize.max_value_length,
            ),
        }
    }

    /// Built-in registry with the configured overrides applied.
    pub fn registry(&self) -> Result<ActionPolicyRegistry> {
        let overrides = self
            .policies
            .iter()
            .map(|p| (p.tool.clone(), p.to_policy()));
        Ok(ActionPolicyRegistry::builtin().with_overrides(overrides)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.confirmation.timeout_secs, 300);
        assert_eq!(config.confirmation.max_pending, 100);
        assert_eq!(
            config.confirmation.bypass_environments,
            vec!["test".to_string(), "development".to_string()]
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_file() {
        let config = GatewayConfig::from_toml(
            r#"
            [server]
            environment = "production"

            [confirmation]
            timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server.name, "cloudgate");
        assert_eq!(config.server.environment.as_deref(), Some("production"));
        assert_eq!(config.confirmation.timeout_secs, 60);
        assert_eq!(config.confirmation.max_pending, 100);
        assert_eq!(config.guard_settings().timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_policy_overrides() {
        let config = GatewayConfig::from_toml(
            r#"
            [[policies]]
            tool = "delete_iso"
            severity = "high"
            category = "Storage Operations"
            description = "Delete an ISO"
            warning_message = "Gone for good"
            required_confirmation = "delete iso"
            impact_scope = "single-resource"
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        let registry = config.registry().unwrap();
        let policy = registry.lookup("delete_iso").unwrap();
        assert_eq!(policy.severity, Severity::High);
        assert!(!policy.reversible);
        assert!(registry.is_dangerous("destroy_virtual_machine"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = GatewayConfig::default();
        config.confirmation.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = GatewayConfig::default();
        config.confirmation.max_pending = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.confirmation.timeout_secs = 10_000_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = GatewayConfig::default();
        config.confirmation.timeout_secs = MAX_CONFIRMATION_TIMEOUT.as_secs();
        assert!(config.validate().is_ok());

        let config = GatewayConfig::from_toml(
            r#"
            [[policies]]
            tool = "delete_iso"
            severity = "high"
            category = "Storage Operations"
            description = "Delete an ISO"
            warning_message = "Gone for good"
            required_confirmation = ""
            impact_scope = "single-resource"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Policy(_))));
    }

    #[test]
    fn test_rejects_unknown_severity() {
        let result = GatewayConfig::from_toml(
            r#"
            [[policies]]
            tool = "x"
            severity = "apocalyptic"
            category = "c"
            description = "d"
            warning_message = "w"
            required_confirmation = "p"
            impact_scope = "single-resource"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let config = GatewayConfig::default();
        let rendered = config.to_toml().unwrap();
        assert_eq!(GatewayConfig::from_toml(&rendered).unwrap(), config);
    }
}
