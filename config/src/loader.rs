//! Configuration loading utilities
//!
//! Resolves which configuration file to read and turns it into a
//! [`GatewayConfig`].

use crate::{ConfigError, GatewayConfig, Result};
use std::path::{Path, PathBuf};

/// Loader for the gateway configuration file
pub struct ConfigLoader {
    /// Configuration file path
    path: PathBuf,
    /// Whether to use default values when the file is missing
    use_defaults: bool,
    /// Whether to validate configuration after loading
    validate: bool,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_defaults: true,
            validate: true,
        }
    }

    /// Loader for the system-wide configuration file
    pub fn system() -> Self {
        Self::new(paths::system_config())
    }

    /// Loader for the per-user configuration file
    pub fn user() -> Result<Self> {
        let path = paths::user_config()
            .ok_or_else(|| ConfigError::Invalid("HOME not set".to_string()))?;
        Ok(Self::new(path))
    }

    /// Set whether to use defaults for a missing file
    pub fn use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    /// Set whether to validate configuration
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration
    pub fn load(&self) -> Result<GatewayConfig> {
        if !self.path.exists() {
            if self.use_defaults {
                tracing::debug!(
                    path = %self.path.display(),
                    "Configuration file not found, using defaults"
                );
                return Ok(GatewayConfig::default());
            }
            return Err(ConfigError::NotFound(self.path.clone()));
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config = GatewayConfig::from_toml(&content)?;

        if self.validate {
            config.validate()?;
        }

        tracing::debug!(
            path = %self.path.display(),
            policies = config.policies.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Write `config` to the loader's path, creating parent directories.
    pub fn save(&self, config: &GatewayConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, config.to_toml()?)?;
        Ok(())
    }
}

/// Default configuration paths
pub mod paths {
    use std::path::PathBuf;

    /// System configuration file
    pub fn system_config() -> PathBuf {
        PathBuf::from("/etc/cloudgate/cloudgate.toml")
    }

    /// User configuration
    pub fn user_config() -> Option<PathBuf> {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config/cloudgate/cloudgate.toml"))
    }
}

/// Environment variable names used by the configuration system
pub mod env_vars {
    /// Configuration file override
    pub const CONFIG: &str = "CLOUDGATE_CONFIG";
    /// Default environment label override
    pub const ENVIRONMENT: &str = "CLOUDGATE_ENVIRONMENT";
}

/// Configuration path from the environment, the user file, or the system file,
/// in that order.
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(env_vars::CONFIG) {
        return PathBuf::from(path);
    }
    match paths::user_config() {
        Some(user) if user.exists() => user,
        _ => paths::system_config(),
    }
}

/// Load the configuration from the default location
pub fn load_default() -> Result<GatewayConfig> {
    ConfigLoader::new(get_config_path()).load()
}
