use crate::error::{AppError, Result};
use crate::search::HostGroup;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search engine connection
    pub engine: EngineConfig,

    /// Query defaults
    #[serde(default)]
    pub search: SearchDefaults,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Host groups used to resolve request hosts into access keys
    #[serde(default)]
    pub host_groups: Vec<HostGroup>,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("KUMQUAT_CONFIG").unwrap_or_else(|_| "config/kumquat.toml".to_string());
        Self::load_from(&config_path, false)
    }

    /// Load configuration, layering `path` over the built-in defaults.
    /// Environment variables (prefix `KUMQUAT__`, `__` separated) win over both.
    pub fn load_from(path: impl AsRef<Path>, required: bool) -> Result<Self> {
        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::from(path.as_ref()).required(required))
            // Override with environment variables (prefix: KUMQUAT__)
            .add_source(
                config::Environment::with_prefix("KUMQUAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no search could run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.endpoint.trim().is_empty() {
            return Err(AppError::Validation(
                "engine.endpoint must not be empty".to_string(),
            ));
        }
        if self.engine.max_result_window == 0 {
            return Err(AppError::Validation(
                "engine.max_result_window must be greater than zero".to_string(),
            ));
        }
        if self.engine.reindex_max_polls == 0 {
            return Err(AppError::Validation(
                "engine.reindex_max_polls must be greater than zero".to_string(),
            ));
        }
        if self.search.bucket_limit == 0 {
            return Err(AppError::Validation(
                "search.bucket_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            search: SearchDefaults::default(),
            observability: ObservabilityConfig::default(),
            host_groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine's REST API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// The engine's `index.max_result_window`; `from + size` never exceeds it
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,

    /// Delay between task status polls during asynchronous reindexing
    #[serde(default = "default_reindex_poll_interval")]
    pub reindex_poll_interval_ms: u64,

    /// Task status polls before asynchronous reindexing gives up
    #[serde(default = "default_reindex_max_polls")]
    pub reindex_max_polls: u32,

    /// Index (or alias) names per entity type
    #[serde(default)]
    pub indexes: IndexNames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            max_result_window: default_max_result_window(),
            reindex_poll_interval_ms: default_reindex_poll_interval(),
            reindex_max_polls: default_reindex_max_polls(),
            indexes: IndexNames::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexNames {
    #[serde(default = "default_items_index")]
    pub items: String,

    #[serde(default = "default_collections_index")]
    pub collections: String,

    #[serde(default = "default_agents_index")]
    pub agents: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            items: default_items_index(),
            collections: default_collections_index(),
            agents: default_agents_index(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    /// Page size when the caller sets no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Maximum terms returned per facet
    #[serde(default = "default_bucket_limit")]
    pub bucket_limit: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            bucket_limit: default_bucket_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Register Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

// Default value functions
fn default_endpoint() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_result_window() -> usize {
    10_000
}

fn default_reindex_poll_interval() -> u64 {
    1_000
}

fn default_reindex_max_polls() -> u32 {
    3_600
}

fn default_items_index() -> String {
    "kumquat_items".to_string()
}

fn default_collections_index() -> String {
    "kumquat_collections".to_string()
}

fn default_agents_index() -> String {
    "kumquat_agents".to_string()
}

fn default_limit() -> usize {
    25
}

fn default_bucket_limit() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.engine.endpoint, "http://localhost:9200");
        assert_eq!(config.engine.max_result_window, 10_000);
        assert_eq!(config.search.bucket_limit, 10);
        assert_eq!(config.engine.indexes.items, "kumquat_items");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine]
endpoint = "http://search.internal:9200"
max_result_window = 500

[engine.indexes]
items = "items_v2"

[search]
bucket_limit = 25

[[host_groups]]
key = "campus"
patterns = ["*.example.edu"]
"#
        )
        .unwrap();

        let config = Config::load_from(file.path(), true).unwrap();
        assert_eq!(config.engine.endpoint, "http://search.internal:9200");
        assert_eq!(config.engine.max_result_window, 500);
        assert_eq!(config.engine.indexes.items, "items_v2");
        assert_eq!(config.engine.indexes.collections, "kumquat_collections");
        assert_eq!(config.search.bucket_limit, 25);
        assert_eq!(config.search.default_limit, 25);
        assert_eq!(config.host_groups.len(), 1);
    }

    #[test]
    fn test_validation_rejects_empty_endpoint() {
        let mut config = Config::default();
        config.engine.endpoint = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.exit_code(), 2);

        let mut config = Config::default();
        config.engine.max_result_window = 0;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }
}
