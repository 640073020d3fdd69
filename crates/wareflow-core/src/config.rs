//! Run configuration (wareflow.toml)
//!
//! Configuration is an explicit immutable value handed to each adapter
//! constructor; nothing reads ambient global state. Secrets (connection
//! strings, passwords, cloud credentials) never live in the file — they
//! are resolved from the environment by the caller.

use serde::{Deserialize, Serialize};

/// Document-store connection settings (non-secret)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source database name
    pub database: String,

    /// Source collection name
    pub collection: String,
}

/// Object-store staging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Staging bucket name
    pub bucket: String,

    /// Key prefix for staged batches
    #[serde(default)]
    pub partition_prefix: String,

    /// Bucket region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Warehouse connection and table settings (non-secret)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Warehouse host
    pub host: String,

    /// Warehouse port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Warehouse database name
    pub database: String,

    /// Warehouse user
    pub user: String,

    /// Fully qualified target table
    pub table: String,

    /// Fully qualified job-metadata table holding watermarks
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,

    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Job name keying the watermark row
    pub job_name: String,

    /// Deployment timezone for rendered timestamps (IANA name)
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Document-store settings
    pub source: SourceConfig,

    /// Staging settings
    pub staging: StagingConfig,

    /// Warehouse settings
    pub warehouse: WarehouseConfig,
}

fn default_timezone() -> String {
    "Africa/Cairo".to_string()
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

fn default_port() -> u16 {
    5439
}

fn default_metadata_table() -> String {
    "etl.job_metadata".to_string()
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load config from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to a TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Parse the configured timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_toml() -> &'static str {
        r#"
            job_name = "deliveryAttempts"

            [source]
            database = "operations"
            collection = "deliveryAttempts"

            [staging]
            bucket = "etl-staging"
            partition_prefix = "delivery_attempts/"

            [warehouse]
            host = "warehouse.internal"
            database = "analytics"
            user = "etl"
            table = "deliveries.delivery_attempts"
        "#
    }

    #[test]
    fn parse_with_defaults() {
        let config = Config::from_toml(sample_toml()).unwrap();
        assert_eq!(config.job_name, "deliveryAttempts");
        assert_eq!(config.timezone, "Africa/Cairo");
        assert_eq!(config.staging.region, "eu-west-1");
        assert_eq!(config.warehouse.port, 5439);
        assert_eq!(config.warehouse.metadata_table, "etl.job_metadata");
        assert!(!config.warehouse.tls);
    }

    #[test]
    fn timezone_parses() {
        let config = Config::from_toml(sample_toml()).unwrap();
        assert_eq!(config.tz().unwrap(), chrono_tz::Africa::Cairo);
    }

    #[test]
    fn bad_timezone_rejected() {
        let mut config = Config::from_toml(sample_toml()).unwrap();
        config.timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.tz(), Err(ConfigError::InvalidTimezone(_))));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::from_toml(sample_toml()).unwrap();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
