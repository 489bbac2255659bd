//! Configuration management for logdeck
//!
//! Configuration is read from a single file in the config directory. The
//! first of `logdeck.yml`, `logdeck.yaml`, `logdeck.json` and `logdeck.toml`
//! that exists wins; without any of them the defaults apply.

use crate::logs::log_filters::DEFAULT_LIMIT;
use crate::logs::SourcesConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Where the two raw logs live
    pub sources: SourcesConfig,
    /// HTTP API settings
    pub server: ServerConfig,
    /// Listing defaults
    pub query: QueryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Whether to allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size when a request does not name one
    pub default_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
        }
    }
}

enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

fn find_config_file(config_dir: &Path) -> Option<(PathBuf, ConfigFormat)> {
    [
        ("logdeck.yml", ConfigFormat::Yaml),
        ("logdeck.yaml", ConfigFormat::Yaml),
        ("logdeck.json", ConfigFormat::Json),
        ("logdeck.toml", ConfigFormat::Toml),
    ]
    .into_iter()
    .map(|(name, format)| (config_dir.join(name), format))
    .find(|(path, _)| path.exists())
}

/// Load configuration from the config directory
pub fn load_config(config_dir: &Path) -> anyhow::Result<AnalyticsConfig> {
    let Some((path, format)) = find_config_file(config_dir) else {
        // Return default configuration if no config file exists
        return Ok(AnalyticsConfig::default());
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        ConfigFormat::Json => serde_json::from_str(&contents)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
        ConfigFormat::Toml => toml::from_str(&contents)
            .with_context(|| format!("invalid TOML in {}", path.display()))?,
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::MissingFileHandling;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.sources.app_log, PathBuf::from("logs/app.log"));
        assert_eq!(config.sources.error_log, PathBuf::from("logs/error.log"));
        assert_eq!(config.sources.missing_file_handling, MissingFileHandling::Error);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(config.server.cors);
        assert_eq!(config.query.default_limit, 50);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = load_config(temp_dir.path()).unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_load_yaml_config() {
        let temp_dir = tempdir().unwrap();
        let yaml_content = r#"
sources:
  app_log: /var/log/lexicon/app.log
  error_log: /var/log/lexicon/error.log
  missing_file_handling: warn
server:
  port: 9090
  cors: false
"#;
        fs::write(temp_dir.path().join("logdeck.yml"), yaml_content).unwrap();

        let config = load_config(temp_dir.path()).unwrap();
        assert_eq!(config.sources.app_log, PathBuf::from("/var/log/lexicon/app.log"));
        assert_eq!(config.sources.missing_file_handling, MissingFileHandling::Warn);
        assert_eq!(config.server.port, 9090);
        assert!(!config.server.cors);
        // Unset fields keep their defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.query.default_limit, 50);
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = tempdir().unwrap();
        let json_content = r#"{
  "server": { "host": "127.0.0.1", "port": 3000 },
  "query": { "default_limit": 25 }
}"#;
        fs::write(temp_dir.path().join("logdeck.json"), json_content).unwrap();

        let config = load_config(temp_dir.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.query.default_limit, 25);
        assert_eq!(config.sources, SourcesConfig::default());
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = tempdir().unwrap();
        let toml_content = r#"
[sources]
app_log = "data/app.log"
missing_file_handling = "skip"

[query]
default_limit = 10
"#;
        fs::write(temp_dir.path().join("logdeck.toml"), toml_content).unwrap();

        let config = load_config(temp_dir.path()).unwrap();
        assert_eq!(config.sources.app_log, PathBuf::from("data/app.log"));
        assert_eq!(config.sources.error_log, PathBuf::from("logs/error.log"));
        assert_eq!(config.sources.missing_file_handling, MissingFileHandling::Skip);
        assert_eq!(config.query.default_limit, 10);
    }

    #[test]
    fn test_yaml_takes_precedence_over_toml() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("logdeck.yml"), "server:\n  port: 1111\n").unwrap();
        fs::write(temp_dir.path().join("logdeck.toml"), "[server]\nport = 2222\n").unwrap();

        let config = load_config(temp_dir.path()).unwrap();
        assert_eq!(config.server.port, 1111);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("logdeck.json"), "{ not json").unwrap();

        let err = load_config(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("logdeck.json"));
    }
}
