//! Lead discovery.
//!
//! Two strategies: a maps API query (SerpApi-style `local_results` with
//! Places-style `next_page_token` pagination) and a rendered search-results
//! fallback parsed out of the SERP HTML. Either way the caller gets a plain
//! `Vec<Lead>`; discovery errors are logged and produce an empty list, never
//! a panic or an abort.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::fetch::PageFetcher;

/// Directory and aggregator hosts that are never direct outreach targets
const AGGREGATOR_PATTERNS: &[&str] = &[
    "yelp",
    "angi",
    "whitepages",
    "manta",
    "bbb.org",
    "yellowpages",
    "houzz",
    "gov",
    "facebook.com",
    "linkedin.com",
    "support.google.com",
    "thumbtack",
    "homeadvisor",
    "clutch.co",
];

/// A business discovered for outreach. Immutable once discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub title: String,
    pub url: String,
    /// Phone number when the maps API provided one
    pub contact: Option<String>,
    pub category: String,
    pub status: String,
}

impl Lead {
    pub fn new(title: &str, url: &str, category: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            contact: None,
            category: category.to_string(),
            status: "found".to_string(),
        }
    }

    /// Host portion of the lead URL, for domain-level dedup and templates
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// True when the host matches the aggregator deny-list
pub fn is_aggregator(host: &str) -> bool {
    AGGREGATOR_PATTERNS.iter().any(|p| host.contains(p))
}

#[derive(Debug, Deserialize)]
struct MapsResponse {
    #[serde(default)]
    local_results: Vec<MapsPlace>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapsPlace {
    title: Option<String>,
    website: Option<String>,
    phone: Option<String>,
}

pub struct LeadDiscoverer {
    client: reqwest::Client,
    config: AppConfig,
}

impl LeadDiscoverer {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http.request_timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Discover leads for one category in one city.
    ///
    /// Never fails: any HTTP or parse error is logged and yields an empty
    /// list so the batch can continue with other categories.
    pub async fn discover(
        &self,
        city: &str,
        category: &str,
        max_results: usize,
        filter_aggregators: bool,
        use_maps: bool,
    ) -> Vec<Lead> {
        let mut leads = if use_maps {
            self.discover_via_maps(city, category, max_results).await
        } else {
            self.discover_via_search(city, category, max_results).await
        };

        if filter_aggregators {
            let before = leads.len();
            leads.retain(|lead| !is_aggregator(&lead.domain()));
            debug!(
                "Aggregator filter dropped {} of {} leads",
                before - leads.len(),
                before
            );
        }

        leads.truncate(max_results);
        info!(
            "Discovered {} leads for '{}' in '{}'",
            leads.len(),
            category,
            city
        );
        leads
    }

    /// Maps API query with token pagination
    async fn discover_via_maps(&self, city: &str, category: &str, max_results: usize) -> Vec<Lead> {
        let Some(api_key) = self.config.credentials.serpapi_key() else {
            error!("Maps discovery requested but no maps API key is configured");
            return Vec::new();
        };

        let mut leads = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("engine", "google_maps"),
                ("q", category),
                ("location", city),
                ("type", "search"),
                ("api_key", api_key),
                ("hl", "en"),
                ("gl", "us"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("next_page_token", token));
            }

            let response = match self
                .client
                .get(&self.config.discovery.maps_endpoint)
                .query(&params)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Maps query failed: {}", e);
                    return leads;
                }
            };

            if !response.status().is_success() {
                error!("Maps query returned status {}", response.status());
                return leads;
            }

            let page: MapsResponse = match response.json().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!("Failed to parse maps response: {}", e);
                    return leads;
                }
            };

            if page.local_results.is_empty() {
                warn!("Maps returned no local results for '{}' in '{}'", category, city);
            }

            for place in page.local_results {
                // A lead without its own website is not an outreach target
                let Some(website) = place.website.filter(|w| !w.is_empty()) else {
                    continue;
                };
                let mut lead = Lead::new(
                    place.title.as_deref().unwrap_or(category),
                    &website,
                    category,
                );
                lead.contact = place.phone;
                leads.push(lead);

                if leads.len() >= max_results {
                    return leads;
                }
            }

            match page.next_page_token {
                Some(token) if leads.len() < max_results => {
                    // The API rejects immediate token reuse
                    tokio::time::sleep(std::time::Duration::from_millis(
                        self.config.discovery.page_delay_ms,
                    ))
                    .await;
                    page_token = Some(token);
                }
                _ => return leads,
            }
        }
    }

    /// Rendered search-results fallback
    async fn discover_via_search(
        &self,
        city: &str,
        category: &str,
        max_results: usize,
    ) -> Vec<Lead> {
        let query = format!("{} in {}", category, city);
        let search_url = match url::Url::parse_with_params(
            &self.config.discovery.search_endpoint,
            &[("q", query.as_str()), ("hl", "en"), ("gl", "us")],
        ) {
            Ok(u) => u.to_string(),
            Err(e) => {
                error!("Invalid search endpoint: {}", e);
                return Vec::new();
            }
        };

        let fetcher = match PageFetcher::new(&self.config, false) {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to build fetcher for search fallback: {}", e);
                return Vec::new();
            }
        };

        let page = fetcher.fetch(&search_url).await;
        if page.is_empty() {
            error!("Search fallback returned no HTML for '{}'", query);
            return Vec::new();
        }

        parse_search_results(&page.html, category, max_results)
    }

    /// Load leads from a file with one website URL per line.
    /// Lines starting with '#' and blank lines are skipped; URLs without a
    /// scheme get https.
    pub fn load_leads_from_file(path: &std::path::Path) -> anyhow::Result<Vec<Lead>> {
        let content = std::fs::read_to_string(path)?;
        let mut leads = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let url = if line.starts_with("http://") || line.starts_with("https://") {
                line.to_string()
            } else {
                format!("https://{}", line)
            };

            let title = url::Url::parse(&url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| line.to_string());

            leads.push(Lead::new(&title, &url, ""));
        }

        info!("Loaded {} leads from {}", leads.len(), path.display());
        Ok(leads)
    }
}

/// Parse organic result containers out of SERP HTML: first qualifying link
/// per domain wins, redirect wrappers are unwrapped.
fn parse_search_results(html: &str, category: &str, max_results: usize) -> Vec<Lead> {
    let document = Html::parse_document(html);
    let container_selector = Selector::parse("div.g").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();
    let title_selector = Selector::parse("h3").unwrap();

    let mut leads: Vec<Lead> = Vec::new();

    for container in document.select(&container_selector) {
        let Some(link) = container.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let Some(target) = resolve_result_link(href) else {
            continue;
        };

        let Ok(parsed) = url::Url::parse(&target) else {
            continue;
        };
        let Some(host) = parsed.host_str().map(str::to_string) else {
            continue;
        };

        // One lead per domain; search pages repeat hosts constantly
        if leads.iter().any(|l| l.domain() == host) {
            continue;
        }

        let title = container
            .select(&title_selector)
            .next()
            .map(|h| h.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| category.to_string());

        leads.push(Lead::new(&title, &target, category));

        if leads.len() >= max_results {
            break;
        }
    }

    if leads.is_empty() {
        warn!("Search result parser found no leads; page layout may have changed");
    }

    leads
}

/// Unwrap `/url?q=https://target` redirect wrappers; pass absolute links
/// through; drop everything else.
fn resolve_result_link(href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    if href.starts_with("/url?") {
        let full = format!("https://www.google.com{}", href);
        let parsed = url::Url::parse(&full).ok()?;
        for (key, value) in parsed.query_pairs() {
            if key == "q" && value.starts_with("http") {
                return Some(value.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_matching() {
        assert!(is_aggregator("www.yelp.com"));
        assert!(is_aggregator("yellowpages.com"));
        assert!(is_aggregator("texas.gov"));
        assert!(!is_aggregator("acmeplumbing.com"));
    }

    #[test]
    fn test_lead_domain() {
        let lead = Lead::new("Acme", "https://www.acme.com/about", "plumber");
        assert_eq!(lead.domain(), "www.acme.com");
    }

    #[test]
    fn test_resolve_direct_link() {
        assert_eq!(
            resolve_result_link("https://acme.com/").as_deref(),
            Some("https://acme.com/")
        );
    }

    #[test]
    fn test_resolve_redirect_wrapper() {
        let resolved = resolve_result_link("/url?q=https://acme.com/&sa=U&ved=abc");
        assert_eq!(resolved.as_deref(), Some("https://acme.com/"));
    }

    #[test]
    fn test_resolve_rejects_fragment_links() {
        assert!(resolve_result_link("#top").is_none());
        assert!(resolve_result_link("/search?q=more").is_none());
    }

    #[test]
    fn test_parse_search_results_dedups_domains() {
        let html = r#"
            <div class="g"><a href="https://acme.com/"><h3>Acme Plumbing</h3></a></div>
            <div class="g"><a href="https://acme.com/reviews"><h3>Acme Reviews</h3></a></div>
            <div class="g"><a href="https://rival.com/"><h3>Rival Plumbing</h3></a></div>
        "#;
        let leads = parse_search_results(html, "plumber", 10);
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].title, "Acme Plumbing");
        assert_eq!(leads[1].url, "https://rival.com/");
    }

    #[test]
    fn test_parse_search_results_respects_max() {
        let html = r#"
            <div class="g"><a href="https://one.com/"><h3>One</h3></a></div>
            <div class="g"><a href="https://two.com/"><h3>Two</h3></a></div>
            <div class="g"><a href="https://three.com/"><h3>Three</h3></a></div>
        "#;
        let leads = parse_search_results(html, "plumber", 2);
        assert_eq!(leads.len(), 2);
    }

    #[test]
    fn test_parse_search_results_title_falls_back_to_category() {
        let html = r#"<div class="g"><a href="https://one.com/"></a></div>"#;
        let leads = parse_search_results(html, "roofer", 10);
        assert_eq!(leads[0].title, "roofer");
    }

    #[test]
    fn test_load_leads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.txt");
        std::fs::write(&path, "acme.com\n# comment\n\nhttps://rival.com/contact\n").unwrap();

        let leads = LeadDiscoverer::load_leads_from_file(&path).unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].url, "https://acme.com");
        assert_eq!(leads[0].title, "acme.com");
        assert_eq!(leads[1].url, "https://rival.com/contact");
        assert_eq!(leads[1].title, "rival.com");
    }
}
