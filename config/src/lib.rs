//! Cloudgate configuration
//!
//! One TOML file drives the gateway: server identity, confirmation timeout
//! and capacity, bypass environments, redaction rules, the audit log and
//! policy overrides.
//!
//! - [`gateway`]: the configuration model and its conversion into guard settings
//! - [`loader`]: locating and loading the file
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cloudgate_config::ConfigLoader;
//!
//! let config = ConfigLoader::system().load().unwrap();
//! let registry = config.registry().unwrap();
//! println!("{} guarded tools", registry.len());
//! ```

pub mod error;
pub mod gateway;
pub mod loader;

pub use error::{ConfigError, Result};
pub use gateway::{
    AuditConfig, ConfirmationConfig, GatewayConfig, PolicyOverride, SanitizeConfig, ServerConfig,
};
pub use loader::{env_vars, get_config_path, load_default, paths, ConfigLoader};
