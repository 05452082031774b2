//! Pipeline configuration.
//!
//! Loaded from an optional YAML file plus `LEAVEPAY`-prefixed environment
//! variables, later sources overriding earlier ones.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LEAVEPAY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LEAVEPAY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LEAVEPAY_LOG";

/// Main pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working database URL.
    pub database_url: String,
    /// Log database URL. Must be a session independent of `database_url`
    /// so import logs survive working-transaction rollbacks.
    pub log_database_url: String,
    /// Inbound extracts land here.
    pub received_dir: PathBuf,
    /// Consumed extracts are moved here.
    pub processed_dir: PathBuf,
    /// Extracts that failed mid-step are moved here.
    pub error_dir: PathBuf,
    /// Outbound PUB, writeback and report files are written here.
    pub outbound_dir: PathBuf,
    /// Weekly benefit amount cap per employee per benefit week.
    pub weekly_benefit_cap: Decimal,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            database_url: "sqlite:leavepay.db?mode=rwc".to_string(),
            log_database_url: "sqlite:leavepay-log.db?mode=rwc".to_string(),
            received_dir: PathBuf::from("files/received"),
            processed_dir: PathBuf::from("files/processed"),
            error_dir: PathBuf::from("files/error"),
            outbound_dir: PathBuf::from("files/outbound"),
            weekly_benefit_cap: Decimal::new(850, 0),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from file and environment.
    ///
    /// Sources in priority order (later overrides earlier):
    /// 1. `config.yaml` in the current directory (if present)
    /// 2. File named by `LEAVEPAY_CONFIG` (if set)
    /// 3. `LEAVEPAY`-prefixed environment variables
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Defaults with all directories and databases under a scratch root.
    pub fn for_test(root: &std::path::Path) -> Self {
        PipelineConfig {
            database_url: "sqlite::memory:".to_string(),
            log_database_url: "sqlite::memory:".to_string(),
            received_dir: root.join("received"),
            processed_dir: root.join("processed"),
            error_dir: root.join("error"),
            outbound_dir: root.join("outbound"),
            weekly_benefit_cap: Decimal::new(850, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_yaml() {
        let config: PipelineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.weekly_benefit_cap, Decimal::new(850, 0));
        assert_eq!(config.received_dir, PathBuf::from("files/received"));
    }

    #[test]
    fn test_yaml_overrides() {
        let config: PipelineConfig = serde_yaml::from_str(
            "weekly_benefit_cap: \"1000.50\"\noutbound_dir: /srv/pub/outbound\n",
        )
        .unwrap();
        assert_eq!(config.weekly_benefit_cap, Decimal::new(100050, 2));
        assert_eq!(config.outbound_dir, PathBuf::from("/srv/pub/outbound"));
    }
}
