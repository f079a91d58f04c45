pub mod wiremock_helpers;

use outreachbot::config::{AppConfig, DEFAULT_CONFIG};

/// Test configuration: the embedded default template with every delay
/// zeroed so tests run fast.
pub fn test_config() -> AppConfig {
    let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).expect("default config parses");
    config.fetch.politeness_delay_ms = 0;
    config.retry.max_retries = 1;
    config.retry.backoff_base_delay_ms = 1;
    config.retry.backoff_max_delay_ms = 5;
    config.discovery.page_delay_ms = 0;
    config.pipeline.lead_delay_ms = 0;
    config
}
