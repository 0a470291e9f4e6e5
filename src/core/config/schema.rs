//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$TUNRULES_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/tunrules/config.toml`
//! 3. `~/.tunrules/config.toml`
//!
//! # Validation
//!
//! Config values are validated after parsing: store file names must be
//! plain, non-empty and distinct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::policy::TunnelMode;

/// Default lock file name.
pub const DEFAULT_LOCK_FILE: &str = "vpn_rules.lock";

/// Default scratch file name.
pub const DEFAULT_TEMP_FILE: &str = "vpn_rules_temp.json";

/// Default rules file name.
pub const DEFAULT_RULES_FILE: &str = "vpn_rules.json";

/// Configuration file contents.
///
/// # Example
///
/// ```toml
/// [store]
/// dir = "/var/lib/tunrules"
/// rules_file = "vpn_rules.json"
///
/// [policy]
/// mode = "exclude"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Rule store location
    pub store: Option<StoreConfig>,

    /// Tunnel policy defaults
    pub policy: Option<PolicyConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(store) = &self.store {
            store.validate()?;
        }
        Ok(())
    }
}

/// Rule store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding the lock, temp and rules files
    pub dir: Option<PathBuf>,

    /// Lock file name (default: "vpn_rules.lock")
    pub lock_file: Option<String>,

    /// Scratch file name (default: "vpn_rules_temp.json")
    pub temp_file: Option<String>,

    /// Rules file name (default: "vpn_rules.json")
    pub rules_file: Option<String>,
}

impl StoreConfig {
    pub fn lock_file(&self) -> &str {
        self.lock_file.as_deref().unwrap_or(DEFAULT_LOCK_FILE)
    }

    pub fn temp_file(&self) -> &str {
        self.temp_file.as_deref().unwrap_or(DEFAULT_TEMP_FILE)
    }

    pub fn rules_file(&self) -> &str {
        self.rules_file.as_deref().unwrap_or(DEFAULT_RULES_FILE)
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a file name is empty, contains
    /// a path separator, or collides with another.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("lock_file", self.lock_file()),
            ("temp_file", self.temp_file()),
            ("rules_file", self.rules_file()),
        ];

        for (key, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!("store.{} cannot be empty", key)));
            }
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                return Err(ConfigError::InvalidValue(format!(
                    "store.{} must be a plain file name, got '{}'",
                    key, name
                )));
            }
        }

        for (i, (key_a, a)) in names.iter().enumerate() {
            for (key_b, b) in &names[i + 1..] {
                if a == b {
                    return Err(ConfigError::InvalidValue(format!(
                        "store.{} and store.{} must differ (both '{}')",
                        key_a, key_b, a
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Tunnel policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Tunnel mode (default: "all")
    pub mode: Option<TunnelMode>,
}
