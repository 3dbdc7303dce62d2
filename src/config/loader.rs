//! Configuration loader with environment variable expansion and overrides

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Environment variables that override file values.
pub const ENV_BUCKET: &str = "AWS_BUCKET_NAME";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ACCESS_KEY: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_ENDPOINT: &str = "AWS_ENDPOINT_URL";
pub const ENV_PORT: &str = "PORT";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        Self::finish(config)
    }

    /// Build configuration from defaults and environment variables only
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::finish(Config::default())
    }

    /// Parse YAML after expanding `${VAR}` placeholders
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    fn finish(mut config: Config) -> Result<Config, ConfigError> {
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables on top of file values.
    ///
    /// Empty variables are treated as unset.
    pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
        if let Some(bucket) = env_value(ENV_BUCKET) {
            config.storage.bucket = bucket;
        }
        if let Some(region) = env_value(ENV_REGION) {
            config.storage.region = region;
        }
        if let Some(access_key) = env_value(ENV_ACCESS_KEY) {
            config.storage.access_key = Some(access_key);
        }
        if let Some(secret_key) = env_value(ENV_SECRET_KEY) {
            config.storage.secret_key = Some(secret_key);
        }
        if let Some(endpoint) = env_value(ENV_ENDPOINT) {
            config.storage.endpoint = Some(endpoint);
        }
        if let Some(port) = env_value(ENV_PORT) {
            let port = port.parse::<u16>().map_err(|e| {
                ConfigError::ValidationError(format!("{} value `{}`: {}", ENV_PORT, port, e))
            })?;
            config.server.port = Some(port);
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
