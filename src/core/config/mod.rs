//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here, passed in as overrides)
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$TUNRULES_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/tunrules/config.toml`
//! 3. `~/.tunrules/config.toml`
//!
//! A missing file is not an error; defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use tunnelrules::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! let paths = config.store_paths(None).unwrap();
//! println!("rules file: {}", paths.target.display());
//! println!("mode: {}", config.tunnel_mode());
//! ```

pub mod schema;

pub use schema::{ConfigFile, PolicyConfig, StoreConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::policy::TunnelMode;
use crate::core::store::StorePaths;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TUNRULES_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with accessor defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (defaults if no file was found)
    pub file: ConfigFile,
    /// Path the config was loaded from
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read,
    /// parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        debug!(path = %path.display(), "loaded config");
        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file.
    fn locate() -> Option<PathBuf> {
        // 1. Check $TUNRULES_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/tunrules/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("tunrules/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.tunrules/config.toml
        dirs::home_dir()
            .map(|home| home.join(".tunrules/config.toml"))
            .filter(|path| path.exists())
    }

    /// Default store directory: `~/.tunrules`.
    pub fn default_store_dir() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".tunrules"))
    }

    /// Store settings, or defaults if the section is absent.
    pub fn store(&self) -> StoreConfig {
        self.file.store.clone().unwrap_or_default()
    }

    /// Resolve the lock, temp and rules paths.
    ///
    /// `dir_override` (from the CLI) takes precedence over `store.dir`.
    pub fn store_paths(&self, dir_override: Option<&Path>) -> Result<StorePaths, ConfigError> {
        let store = self.store();
        let dir = match dir_override.map(Path::to_path_buf).or_else(|| store.dir.clone()) {
            Some(dir) => dir,
            None => Self::default_store_dir()?,
        };

        Ok(StorePaths::new(
            dir.join(store.lock_file()),
            dir.join(store.temp_file()),
            dir.join(store.rules_file()),
        ))
    }

    /// Get the tunnel mode.
    ///
    /// Defaults to `all` if not configured.
    pub fn tunnel_mode(&self) -> TunnelMode {
        self.file
            .policy
            .as_ref()
            .and_then(|p| p.mode)
            .unwrap_or_default()
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, contents: &str) -> PathBuf {
        let path = temp.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
            [store]
            dir = "/srv/rules"
            rules_file = "rules.json"

            [policy]
            mode = "exclude"
            "#,
        );

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.loaded_from(), Some(path.as_path()));
        assert_eq!(config.tunnel_mode(), TunnelMode::ExcludeApps);

        let paths = config.store_paths(None).unwrap();
        assert_eq!(paths.target, PathBuf::from("/srv/rules/rules.json"));
        assert_eq!(paths.lock, PathBuf::from("/srv/rules/vpn_rules.lock"));
    }

    #[test]
    fn dir_override_wins() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "[store]\ndir = \"/srv/rules\"\n");
        let config = Config::load_from(&path).unwrap();

        let paths = config.store_paths(Some(Path::new("/other"))).unwrap();
        assert_eq!(paths.target, PathBuf::from("/other/vpn_rules.json"));
        assert_eq!(paths.temp, PathBuf::from("/other/vpn_rules_temp.json"));
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.tunnel_mode(), TunnelMode::AllApps);
        assert!(config.loaded_from().is_none());

        let paths = config.store_paths(Some(Path::new("/d"))).unwrap();
        assert_eq!(paths.lock, PathBuf::from("/d/vpn_rules.lock"));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "[store\n");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_values_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "[store]\nlock_file = \"vpn_rules.json\"\n");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
