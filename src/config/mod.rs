//! Configuration for wikicorpus

mod extract;
mod logging;

pub use extract::{ConvertConfig, ExtractConfig, MarkupErrorPolicy, DEFAULT_BLOCK_SIZE};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "wikicorpus.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Streaming extraction configuration
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Markup conversion configuration
    #[serde(default)]
    pub convert: ConvertConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.extract.block_size == 0 {
            errors.push("block_size must be positive".to_string());
        }
        for namespace in &self.extract.ignored_namespaces {
            if namespace.trim().is_empty() {
                errors.push("ignored_namespaces must not contain empty names".to_string());
            } else if namespace.contains(':') {
                errors.push(format!(
                    "ignored namespace '{}' must not contain ':'",
                    namespace
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
