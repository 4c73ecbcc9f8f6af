use crate::error::{Error, Result};
use crate::metrics::SortBy;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Backend connection settings.
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Model used by the local industry classifier.
#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: crate::llm::Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: crate::llm::Provider::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_key_env: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardConfig {
    /// Year whose twelve months make up the time series.
    #[serde(default = "default_target_year")]
    pub target_year: i32,
    /// How many industries the per-vendor industry breakdown keeps.
    #[serde(default = "default_top_industries")]
    pub top_industries: usize,
    #[serde(default = "default_cache_poll_secs")]
    pub cache_poll_secs: u64,
    #[serde(default)]
    pub default_sort: SortBy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            target_year: default_target_year(),
            top_industries: default_top_industries(),
            cache_poll_secs: default_cache_poll_secs(),
            default_sort: SortBy::default(),
        }
    }
}

// Defaults
fn default_base_url() -> String {
    std::env::var("VAMBE_API_URL").unwrap_or_else(|_| "http://localhost:3001/api".into())
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_model() -> String {
    "arcee-ai/trinity-large-preview:free".into()
}
fn default_max_tokens() -> u32 {
    256
}
fn default_target_year() -> i32 {
    2024
}
fn default_top_industries() -> usize {
    8
}
fn default_cache_poll_secs() -> u64 {
    30
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::config(
                "api.base_url is empty. Set VAMBE_API_URL or api.base_url in config.toml",
            ));
        }
        if self.dashboard.cache_poll_secs == 0 {
            return Err(Error::config("dashboard.cache_poll_secs must be positive"));
        }
        if !(1970..=9999).contains(&self.dashboard.target_year) {
            return Err(Error::config(format!(
                "dashboard.target_year out of range: {}",
                self.dashboard.target_year
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml = r#"
[api]
base_url = "https://metrics.example.com/api"
timeout_secs = 10
max_retries = 1

[llm]
provider = "anthropic"
model = "test-model"
max_tokens = 128

[dashboard]
target_year = 2025
top_industries = 5
cache_poll_secs = 60
default_sort = "total"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://metrics.example.com/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.max_retries, 1);
        assert_eq!(config.api.retry_base_delay_ms, 500);
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.dashboard.target_year, 2025);
        assert_eq!(config.dashboard.top_industries, 5);
        assert_eq!(config.dashboard.default_sort, SortBy::Total);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.dashboard.target_year, 2024);
        assert_eq!(config.dashboard.top_industries, 8);
        assert_eq!(config.dashboard.cache_poll_secs, 30);
        assert_eq!(config.dashboard.default_sort, SortBy::Conversion);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.llm.max_tokens, 256);
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.api.base_url = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_and_bad_year() {
        let mut config = Config::default();
        config.dashboard.cache_poll_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dashboard.target_year = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.llm.provider, crate::llm::Provider::OpenRouter);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.dashboard.target_year, 2024);
    }
}
