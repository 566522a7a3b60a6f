//! Configuration management for leadcleaner
//!
//! Configuration is loaded from `./config/leadcleaner.toml`. The same file is
//! embedded in the binary and used when no file exists on disk.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::export::LongNameFlag;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/leadcleaner.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/leadcleaner.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("At least one DoH server must be configured")]
    NoServersConfigured,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub dns: DnsConfig,
    #[serde(default)]
    pub mx: MxConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// DNS resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    pub doh_servers: Vec<DohServerConfig>,
}

/// DNS-over-HTTPS server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DohServerConfig {
    pub name: String,
    pub url: String,
    pub timeout_secs: u64,
}

/// Batch MX resolution settings
#[derive(Debug, Clone, Deserialize)]
pub struct MxConfig {
    /// Domains resolved concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches (milliseconds)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_batch_size() -> usize {
    30
}

fn default_batch_delay_ms() -> u64 {
    300
}

impl Default for MxConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

/// Export decoration settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_long_name_threshold")]
    pub long_name_threshold: usize,
    #[serde(default)]
    pub long_name_flag: LongNameFlag,
}

fn default_long_name_threshold() -> usize {
    32
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            long_name_threshold: default_long_name_threshold(),
            long_name_flag: LongNameFlag::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration embedded in the binary
    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        if self.dns.doh_servers.is_empty() {
            return Err(ConfigError::NoServersConfigured);
        }

        // Plain http is accepted so a local resolver can stand in during testing
        for (i, server) in self.dns.doh_servers.iter().enumerate() {
            if !server.url.starts_with("https://") && !server.url.starts_with("http://") {
                return Err(ConfigError::InvalidUrl {
                    field: format!("dns.doh_servers[{}].url", i),
                    url: server.url.clone(),
                });
            }
        }

        if self.mx.batch_size == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "mx.batch_size".to_string(),
            });
        }

        Ok(())
    }

    /// Write the default configuration file to `path`, creating parent
    /// directories. An existing file is left untouched and reported as an error.
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::embedded_default().unwrap();
        assert_eq!(config.dns.doh_servers.len(), 2);
        assert_eq!(config.mx.batch_size, 30);
        assert_eq!(config.mx.batch_delay_ms, 300);
        assert_eq!(config.export.long_name_threshold, 32);
        assert_eq!(config.export.long_name_flag, LongNameFlag::None);
    }

    #[test]
    fn test_optional_sections_default() {
        let config_str = r#"
[http]
user_agent = "test/1.0"
request_timeout_secs = 30

[[dns.doh_servers]]
name = "Test DoH"
url = "https://test.example.com/dns-query"
timeout_secs = 3
"#;

        let config = AppConfig::from_toml(config_str).expect("Config should parse without mx/export");
        assert_eq!(config.mx.batch_size, 30);
        assert_eq!(config.mx.batch_delay_ms, 300);
        assert_eq!(config.export.long_name_threshold, 32);
    }

    #[test]
    fn test_custom_values_parse() {
        let config_str = r#"
[http]
user_agent = "test/1.0"
request_timeout_secs = 30

[[dns.doh_servers]]
name = "Local"
url = "http://127.0.0.1:8053/resolve"
timeout_secs = 1

[mx]
batch_size = 5
batch_delay_ms = 0

[export]
long_name_threshold = 20
long_name_flag = "highlight"
"#;

        let config = AppConfig::from_toml(config_str).expect("Config should parse");
        assert_eq!(config.mx.batch_size, 5);
        assert_eq!(config.mx.batch_delay_ms, 0);
        assert_eq!(config.export.long_name_threshold, 20);
        assert_eq!(config.export.long_name_flag, LongNameFlag::Highlight);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AppConfig::embedded_default().unwrap();
        config.dns.doh_servers[0].url = "dns.google/resolve".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        let mut config = AppConfig::embedded_default().unwrap();
        config.mx.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRequired { .. })));

        let mut config = AppConfig::embedded_default().unwrap();
        config.dns.doh_servers.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoServersConfigured)));
    }

    #[test]
    fn test_missing_file_reported() {
        let result = AppConfig::load_from_path(Path::new("/nonexistent/leadcleaner.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_create_default_config_at_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("leadcleaner.toml");
        let written = AppConfig::create_default_config_at(&path).unwrap();
        assert_eq!(written, path);
        assert!(AppConfig::load_from_path(&path).is_ok());

        // Second call must not clobber the file
        assert!(matches!(
            AppConfig::create_default_config_at(&path),
            Err(ConfigError::IoError(_))
        ));
    }
}
