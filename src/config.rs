//! Configuration management for outreachbot
//!
//! All configuration is loaded from `./config/outreachbot.toml`. Defaults
//! live in the embedded config template, not in source code. Credentials may
//! be overridden from the environment (see the template for the variable
//! names).

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/outreachbot.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/outreachbot.toml");

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
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    pub discovery: DiscoveryConfig,
    pub proxies: ProxiesConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    pub sender: SenderConfig,
    pub pain: PainConfig,
    pub compose: ComposeConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Fetch fallback chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub politeness_delay_ms: u64,
    #[serde(default)]
    pub robots_check: bool,
    pub browser_timeout_secs: u64,
    pub browser_render_wait_ms: u64,
}

/// Backoff strategy for transient-failure retries
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    Exponential,
}

/// Retry configuration for transient network failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_strategy: BackoffStrategy,
    pub backoff_base_delay_ms: u64,
    pub backoff_max_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before the given attempt (1-indexed; attempt 0 gets no delay)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.backoff_base_delay_ms;
        let raw = match self.backoff_strategy {
            BackoffStrategy::Linear => base.saturating_mul(attempt as u64),
            BackoffStrategy::Exponential => {
                base.saturating_mul(1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX))
            }
        };
        Duration::from_millis(raw.min(self.backoff_max_delay_ms))
    }
}

/// Lead discovery endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub maps_endpoint: String,
    pub search_endpoint: String,
    pub page_delay_ms: u64,
}

/// Render-proxy service endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ProxiesConfig {
    pub scrapfly_endpoint: String,
    pub scraperapi_endpoint: String,
}

/// API credentials; empty string means unset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub serpapi_key: String,
    #[serde(default)]
    pub scrapfly_key: String,
    #[serde(default)]
    pub scraperapi_key: String,
    #[serde(default)]
    pub openai_api_key: String,
}

impl CredentialsConfig {
    pub fn serpapi_key(&self) -> Option<&str> {
        non_empty(&self.serpapi_key)
    }

    pub fn scrapfly_key(&self) -> Option<&str> {
        non_empty(&self.scrapfly_key)
    }

    pub fn scraperapi_key(&self) -> Option<&str> {
        non_empty(&self.scraperapi_key)
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        non_empty(&self.openai_api_key)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Sender identity and SMTP settings
#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    #[serde(default)]
    pub name: String,
    pub website: String,
    pub from_address: String,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_pass: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Pain-point analyzer thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct PainConfig {
    pub max_points: usize,
    pub alt_text_threshold: usize,
}

/// Email composition settings
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeConfig {
    #[serde(default)]
    pub use_llm: bool,
    pub model: String,
}

/// Pipeline loop settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub lead_delay_ms: u64,
    pub outreach_log_path: String,
    pub history_path: String,
}

impl AppConfig {
    /// Load configuration from the default path and apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values so credentials
    /// can stay out of the config file entirely.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SERPAPI_KEY") {
            self.credentials.serpapi_key = v;
        }
        if let Ok(v) = std::env::var("SCRAPFLY_KEY") {
            self.credentials.scrapfly_key = v;
        }
        if let Ok(v) = std::env::var("SCRAPERAPI_KEY") {
            self.credentials.scraperapi_key = v;
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.credentials.openai_api_key = v;
        }
        if let Ok(v) = std::env::var("SMTP_HOST") {
            self.sender.smtp_host = v;
        }
        if let Ok(v) = std::env::var("SMTP_PORT") {
            if let Ok(port) = v.parse() {
                self.sender.smtp_port = port;
            }
        }
        if let Ok(v) = std::env::var("SMTP_USER") {
            self.sender.smtp_user = v;
        }
        if let Ok(v) = std::env::var("SMTP_PASS") {
            self.sender.smtp_pass = v;
        }
        if let Ok(v) = std::env::var("SENDER_NAME") {
            self.sender.name = v;
        }
        if let Ok(v) = std::env::var("SENDER_WEBSITE") {
            self.sender.website = v;
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        for (field, url) in [
            ("discovery.maps_endpoint", &self.discovery.maps_endpoint),
            ("discovery.search_endpoint", &self.discovery.search_endpoint),
            ("proxies.scrapfly_endpoint", &self.proxies.scrapfly_endpoint),
            ("proxies.scraperapi_endpoint", &self.proxies.scraperapi_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidUrl {
                    field: field.to_string(),
                    url: url.clone(),
                });
            }
        }

        if self.sender.website.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "sender.website".to_string(),
            });
        }
        if self.sender.from_address.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "sender.from_address".to_string(),
            });
        }
        if self.pain.max_points == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "pain.max_points".to_string(),
            });
        }
        if self.pipeline.outreach_log_path.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "pipeline.outreach_log_path".to_string(),
            });
        }
        if self.pipeline.history_path.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "pipeline.history_path".to_string(),
            });
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
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
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok(), "Default config should validate");
    }

    #[test]
    fn test_empty_credentials_are_none() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.credentials.serpapi_key().is_none());
        assert!(config.credentials.scrapfly_key().is_none());
        assert!(config.credentials.scraperapi_key().is_none());
        assert!(config.credentials.openai_api_key().is_none());
    }

    #[test]
    fn test_backoff_delay_linear() {
        let retry = RetryConfig {
            max_retries: 3,
            backoff_strategy: BackoffStrategy::Linear,
            backoff_base_delay_ms: 1000,
            backoff_max_delay_ms: 30000,
        };
        assert_eq!(retry.backoff_delay(0), Duration::ZERO);
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(retry.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(retry.backoff_delay(3), Duration::from_millis(3000));
    }

    #[test]
    fn test_backoff_delay_exponential() {
        let retry = RetryConfig {
            max_retries: 3,
            backoff_strategy: BackoffStrategy::Exponential,
            backoff_base_delay_ms: 1000,
            backoff_max_delay_ms: 30000,
        };
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(retry.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(retry.backoff_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_delay_capped() {
        let retry = RetryConfig {
            max_retries: 10,
            backoff_strategy: BackoffStrategy::Exponential,
            backoff_base_delay_ms: 1000,
            backoff_max_delay_ms: 5000,
        };
        assert_eq!(retry.backoff_delay(10), Duration::from_millis(5000));
    }
}
