//! Page fetching with an ordered fallback chain.
//!
//! Strategies run in order until one yields content:
//! 1. optional robots.txt blanket-disallow check
//! 2. direct HTTP GET (retried with backoff)
//! 3. Scrapfly-style render proxy, if a key is configured (retried)
//! 4. ScraperAPI-style proxy, if a key is configured
//! 5. headless Chrome, if enabled
//!
//! `fetch` itself never fails: when every strategy is exhausted it returns
//! an empty page so the pipeline can record the lead as fetch_failed and
//! keep moving.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::retry::RetryHelper;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level failure worth retrying (timeout, connect, reset)
    #[error("transient network failure: {0}")]
    Transient(String),

    /// Strategy requires an API key that is not configured
    #[error("missing credential for {0}")]
    CredentialMissing(&'static str),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Http(u16),

    /// Response arrived but could not be interpreted
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Result of a successful page fetch
#[derive(Debug, Clone)]
pub struct PageContent {
    /// URL that was requested
    pub url: String,
    /// URL after redirects (equals `url` when nothing was fetched)
    pub final_url: String,
    /// Raw HTML; empty when every strategy failed
    pub html: String,
}

impl PageContent {
    /// Empty page marking total fetch exhaustion
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            html: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

/// Scrapfly-style proxy JSON envelope (partial)
#[derive(Debug, Deserialize)]
struct RenderProxyResponse {
    result: RenderProxyResult,
}

#[derive(Debug, Deserialize)]
struct RenderProxyResult {
    content: String,
    #[serde(default)]
    url: Option<String>,
}

/// Fetches pages through the fallback chain
pub struct PageFetcher {
    client: reqwest::Client,
    config: AppConfig,
    use_browser: bool,
}

impl PageFetcher {
    pub fn new(config: &AppConfig, use_browser: bool) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.request_timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            use_browser,
        })
    }

    /// Fetch a page, trying each strategy in order.
    ///
    /// Never fails; returns an empty `PageContent` when every strategy is
    /// exhausted.
    pub async fn fetch(&self, url: &str) -> PageContent {
        if self.config.fetch.robots_check && self.robots_disallows_all(url).await {
            warn!("robots.txt disallows all crawling for {}, skipping", url);
            return PageContent::empty(url);
        }

        tokio::time::sleep(Duration::from_millis(self.config.fetch.politeness_delay_ms)).await;

        let retry = RetryHelper::new(&self.config.retry);

        match retry
            .with_retry(|| self.fetch_direct(url), FetchError::is_retryable)
            .await
        {
            Ok(page) => {
                debug!("Direct fetch succeeded for {}", url);
                return page;
            }
            Err(e) => warn!("Direct fetch failed for {}: {}", url, e),
        }

        match retry
            .with_retry(|| self.fetch_via_render_proxy(url), FetchError::is_retryable)
            .await
        {
            Ok(page) => {
                info!("Render proxy fetch succeeded for {}", url);
                return page;
            }
            Err(FetchError::CredentialMissing(service)) => {
                debug!("Skipping {} proxy for {}: no API key configured", service, url)
            }
            Err(e) => warn!("Render proxy fetch failed for {}: {}", url, e),
        }

        match self.fetch_via_forward_proxy(url).await {
            Ok(page) => {
                info!("Forward proxy fetch succeeded for {}", url);
                return page;
            }
            Err(FetchError::CredentialMissing(service)) => {
                debug!("Skipping {} proxy for {}: no API key configured", service, url)
            }
            Err(e) => warn!("Forward proxy fetch failed for {}: {}", url, e),
        }

        if self.use_browser {
            match self.fetch_with_browser(url) {
                Ok(page) => {
                    info!("Headless browser fetch succeeded for {}", url);
                    return page;
                }
                Err(e) => warn!("Headless browser fetch failed for {}: {}", url, e),
            }
        }

        warn!("All fetch strategies exhausted for {}", url);
        PageContent::empty(url)
    }

    /// Direct GET with the configured user agent
    async fn fetch_direct(&self, url: &str) -> Result<PageContent, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        // A 200 with nothing in it is no better than a failure; let the
        // next strategy try for real content
        if html.trim().is_empty() {
            return Err(FetchError::Parse("empty response body".to_string()));
        }

        Ok(PageContent {
            url: url.to_string(),
            final_url,
            html,
        })
    }

    /// JS-rendering proxy (Scrapfly-style JSON envelope)
    async fn fetch_via_render_proxy(&self, url: &str) -> Result<PageContent, FetchError> {
        let key = self
            .config
            .credentials
            .scrapfly_key()
            .ok_or(FetchError::CredentialMissing("scrapfly"))?;

        let response = self
            .client
            .get(&self.config.proxies.scrapfly_endpoint)
            .query(&[("key", key), ("url", url), ("render_js", "true")])
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let envelope: RenderProxyResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        if envelope.result.content.trim().is_empty() {
            return Err(FetchError::Parse("proxy returned empty content".to_string()));
        }

        Ok(PageContent {
            url: url.to_string(),
            final_url: envelope.result.url.unwrap_or_else(|| url.to_string()),
            html: envelope.result.content,
        })
    }

    /// Plain forwarding proxy (ScraperAPI-style, body is the page verbatim)
    async fn fetch_via_forward_proxy(&self, url: &str) -> Result<PageContent, FetchError> {
        let key = self
            .config
            .credentials
            .scraperapi_key()
            .ok_or(FetchError::CredentialMissing("scraperapi"))?;

        let response = self
            .client
            .get(&self.config.proxies.scraperapi_endpoint)
            .query(&[("api_key", key), ("url", url)])
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        if html.trim().is_empty() {
            return Err(FetchError::Parse("proxy returned empty content".to_string()));
        }

        Ok(PageContent {
            url: url.to_string(),
            final_url: url.to_string(),
            html,
        })
    }

    /// Headless Chrome fallback for JavaScript-rendered pages
    fn fetch_with_browser(&self, url: &str) -> Result<PageContent, FetchError> {
        let guard = crate::browser_pool::create_browser()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let tab = guard
            .browser
            .new_tab()
            .map_err(|e| FetchError::Transient(format!("failed to create browser tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_secs(self.config.fetch.browser_timeout_secs));

        tab.navigate_to(url)
            .map_err(|e| FetchError::Transient(format!("failed to navigate to {}: {}", url, e)))?;

        tab.wait_until_navigated()
            .map_err(|e| FetchError::Transient(format!("page failed to load for {}: {}", url, e)))?;

        // Let JS-rendered pages finish painting before grabbing the DOM
        std::thread::sleep(Duration::from_millis(self.config.fetch.browser_render_wait_ms));

        let final_url = tab.get_url();
        let html = tab
            .get_content()
            .map_err(|e| FetchError::Parse(format!("failed to read page content: {}", e)))?;

        if html.trim().is_empty() {
            return Err(FetchError::Parse("browser returned empty content".to_string()));
        }

        Ok(PageContent {
            url: url.to_string(),
            final_url,
            html,
        })
    }

    /// True only when robots.txt has a blanket `Disallow: /` for all agents.
    /// Any error fetching or parsing robots.txt means we proceed.
    async fn robots_disallows_all(&self, url: &str) -> bool {
        let robots_url = match url::Url::parse(url) {
            Ok(parsed) => match parsed.join("/robots.txt") {
                Ok(joined) => joined.to_string(),
                Err(_) => return false,
            },
            Err(_) => return false,
        };

        let body = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(text) => text,
                Err(_) => return false,
            },
            _ => return false,
        };

        robots_blanket_disallow(&body)
    }
}

/// Parse robots.txt text and report whether the wildcard agent group
/// contains a blanket `Disallow: /`.
fn robots_blanket_disallow(body: &str) -> bool {
    let mut in_wildcard_group = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => in_wildcard_group = value == "*",
            "disallow" if in_wildcard_group && value == "/" => return true,
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_blanket_disallow_detected() {
        let body = "User-agent: *\nDisallow: /\n";
        assert!(robots_blanket_disallow(body));
    }

    #[test]
    fn test_robots_partial_disallow_allowed() {
        let body = "User-agent: *\nDisallow: /admin\nDisallow: /private/\n";
        assert!(!robots_blanket_disallow(body));
    }

    #[test]
    fn test_robots_disallow_for_other_agent_ignored() {
        let body = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nDisallow: /tmp\n";
        assert!(!robots_blanket_disallow(body));
    }

    #[test]
    fn test_robots_empty_allows() {
        assert!(!robots_blanket_disallow(""));
    }

    #[test]
    fn test_empty_page_marks_exhaustion() {
        let page = PageContent::empty("https://example.com");
        assert!(page.is_empty());
        assert_eq!(page.final_url, page.url);
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FetchError::Transient("timeout".to_string()).is_retryable());
        assert!(!FetchError::Http(500).is_retryable());
        assert!(!FetchError::CredentialMissing("scrapfly").is_retryable());
        assert!(!FetchError::Parse("bad json".to_string()).is_retryable());
    }
}
