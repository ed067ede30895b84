//! Bridge Configuration
//!
//! Handles parsing and management of curl-bridge.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`BridgeConfig::find_and_load`].
pub const CONFIG_FILE: &str = "curl-bridge.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching curl-bridge.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BridgeConfig {
    /// Native module discovery
    #[serde(default)]
    pub library: LibraryConfig,

    /// CA bundle handed to every new handle
    #[serde(default)]
    pub tls: TlsConfig,

    /// Process-wide initialization
    #[serde(default)]
    pub global: GlobalConfig,
}

impl BridgeConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Native module discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    /// Explicit module path; skips discovery
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Candidate library names, most preferred first
    #[serde(default)]
    pub names: Vec<String>,

    /// Directories searched before the platform defaults
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
}

/// CA bundle settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsConfig {
    /// Existing bundle file used as-is
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,

    /// Inline PEM text written once to the cache directory
    #[serde(default)]
    pub ca_bundle_pem: Option<String>,

    /// Where materialized bundles go; defaults to the system temp directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Process-wide initialization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// Flags for `curl_global_init`
    #[serde(default = "default_init_flags")]
    pub init_flags: i64,
}

fn default_init_flags() -> i64 {
    crate::ffi::CURL_GLOBAL_ALL
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            init_flags: default_init_flags(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.library.path.is_none());
        assert!(config.library.names.is_empty());
        assert!(config.tls.ca_bundle.is_none());
        assert_eq!(config.global.init_flags, 3);
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[library]
path = "/opt/curl/libcurl-impersonate.so"
names = ["curl-impersonate-chrome"]
search_paths = ["/opt/curl"]

[tls]
ca_bundle = "/etc/ssl/certs/ca-certificates.crt"

[global]
init_flags = 1
"#;
        let config: BridgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.library.path.as_deref(),
            Some(Path::new("/opt/curl/libcurl-impersonate.so"))
        );
        assert_eq!(config.library.names, vec!["curl-impersonate-chrome"]);
        assert_eq!(config.library.search_paths, vec![PathBuf::from("/opt/curl")]);
        assert_eq!(
            config.tls.ca_bundle.as_deref(),
            Some(Path::new("/etc/ssl/certs/ca-certificates.crt"))
        );
        assert_eq!(config.global.init_flags, 1);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: BridgeConfig = toml::from_str("[tls]\ncache_dir = \"/tmp/x\"\n").unwrap();
        assert_eq!(config.global.init_flags, 3);
        assert_eq!(config.tls.cache_dir.as_deref(), Some(Path::new("/tmp/x")));
        assert!(config.library.search_paths.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = BridgeConfig::load(Path::new("/nonexistent/curl-bridge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
