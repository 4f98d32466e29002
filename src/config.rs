//! Configuration management for the compatibility gate
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-compat.toml)
//! - Environment variables (SCHEMA_COMPAT__*)
//!
//! ## Example config file (schema-compat.toml):
//! ```toml
//! [registry]
//! urls = ["http://schema-registry:8081"]
//! user_info = "svc-build:secret"
//! cache_capacity = 1000
//!
//! [schemas]
//! imports = ["src/main/avro/common/Money.avsc"]
//!
//! [[schemas.file_sets]]
//! directory = "src/main/avro"
//! includes = ["**/*.avsc"]
//! excludes = ["common/**"]
//!
//! [subjects]
//! name_pattern = '^(?<topicname>.+)-(?<schematypefullname>[^-]+)-value$'
//!
//! [report]
//! format = "text"
//! ```

use std::path::PathBuf;

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::discovery::FileSet;
use crate::error::{GateError, Result};
use crate::registry::DEFAULT_CACHE_CAPACITY;
use crate::subjects::SubjectMatcher;

/// Main configuration for a compatibility run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Remote registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Local schema selection
    #[serde(default)]
    pub schemas: SchemaSetConfig,

    /// Subject naming convention
    #[serde(default)]
    pub subjects: SubjectConfig,

    /// Report settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URLs, tried in order
    #[serde(default)]
    pub urls: Vec<String>,

    /// Basic auth credentials as `user:password`
    #[serde(default)]
    pub user_info: Option<String>,

    /// Number of compatibility answers the client keeps
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Which local files are checked, and which are parsed first as imports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSetConfig {
    #[serde(default = "default_file_sets")]
    pub file_sets: Vec<FileSet>,

    /// Files parsed before any checked file, in this order
    #[serde(default)]
    pub imports: Vec<PathBuf>,
}

/// Subject naming convention
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Regex with a `schematypefullname` named group
    #[serde(default)]
    pub name_pattern: String,
}

/// Report configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
}

/// Output format for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

// Default value functions
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_file_sets() -> Vec<FileSet> {
    vec![FileSet::new("src/main/avro")]
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            user_info: None,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for SchemaSetConfig {
    fn default() -> Self {
        Self {
            file_sets: default_file_sets(),
            imports: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific (required) file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-compat.toml",
            ".schema-compat.toml",
            "config/schema-compat.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-compat-gate", "schema-compat") {
            let xdg_config = config_dir.config_dir().join("schema-compat.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_COMPAT__REGISTRY__URLS="http://a,http://b"
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_COMPAT")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("registry.urls")
                .with_list_parse_key("schemas.imports")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Check that a run can be attempted with this configuration
    pub fn validate(&self) -> Result<()> {
        if self.registry.urls.is_empty() {
            return Err(GateError::Config(
                "at least one schema registry URL is required".to_string(),
            ));
        }
        if self.subjects.name_pattern.is_empty() {
            return Err(GateError::Config(
                "a subject name pattern is required".to_string(),
            ));
        }
        SubjectMatcher::new(&self.subjects.name_pattern)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.registry.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.schemas.file_sets.len(), 1);
        assert_eq!(config.report.format, ReportFormat::Text);
    }

    #[test]
    fn test_serialize_config() {
        let config = GateConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[subjects]"));
    }

    #[test]
    fn test_parse_config_file() {
        let config: GateConfig = toml::from_str(
            r#"
            [registry]
            urls = ["http://localhost:8081"]

            [[schemas.file_sets]]
            directory = "avro"
            excludes = ["legacy/**"]

            [subjects]
            name_pattern = '^(?<topicname>.+)-(?<schematypefullname>.+)-value$'
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.urls, vec!["http://localhost:8081"]);
        assert_eq!(config.registry.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.schemas.file_sets[0].directory, PathBuf::from("avro"));
        assert!(config.schemas.file_sets[0].includes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_incomplete_config() {
        let mut config = GateConfig::default();
        assert!(matches!(config.validate(), Err(GateError::Config(_))));

        config.registry.urls.push("http://localhost:8081".to_string());
        assert!(matches!(config.validate(), Err(GateError::Config(_))));

        config.subjects.name_pattern = "^(?<topicname>.+)-value$".to_string();
        assert!(matches!(config.validate(), Err(GateError::InvalidPattern { .. })));
    }
}
