//! Pain-point analysis for scraped business sites.
//!
//! The rule-based core is deterministic: structural checks against the DOM
//! plus a keyword/sentence scan over the tag-stripped page text. An optional
//! LLM pass appends free-text suggestions; when the credential is missing or
//! the call fails the suggestions are simply omitted.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::PainConfig;
use crate::fetch::PageContent;
use crate::llm::LlmClient;

/// Phrases that signal a fixable website problem when they appear in copy
const PAIN_KEYWORDS: &[&str] = &[
    "not converting",
    "low traffic",
    "slow",
    "broken",
    "outdated",
    "not mobile",
    "no online booking",
    "hard to find",
    "no reviews",
    "negative reviews",
    "poor seo",
    "bad user experience",
    "high bounce rate",
    "security issues",
    "no ssl",
    "loading slowly",
    "mobile unfriendly",
];

/// Words that flag a sentence as describing a problem
const PROBLEM_WORDS: &[&str] = &[
    "problem",
    "struggling",
    "issue",
    "challenge",
    "hard to",
    "difficulty",
    "frustrating",
];

/// Negations that void a keyword or problem word when they appear just
/// before it ("no problem at all", "never slow")
const NEGATION_WORDS: &[&str] = &["not", "no", "never", "without", "none", "zero"];

/// Script URL fragments that identify an analytics installation
const ANALYTICS_SIGNATURES: &[&str] = &[
    "gtag",
    "analytics.js",
    "googletagmanager",
    "gtm.js",
    "plausible",
    "fathom",
    "matomo",
];

/// How far to truncate a quoted problem sentence
const SENTENCE_TRUNCATE: usize = 250;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub struct PainAnalyzer {
    config: PainConfig,
}

impl PainAnalyzer {
    pub fn new(config: &PainConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Rule-based analysis: structural checks plus keyword/sentence scan.
    /// Deterministic for a given page; result deduped and capped.
    pub fn analyze(&self, page: &PageContent) -> Vec<String> {
        if page.is_empty() {
            return Vec::new();
        }

        let mut points = Vec::new();

        self.structural_checks(page, &mut points);

        let text = normalize_text(&page.html);
        keyword_hits(&text, &mut points);
        problem_sentences(&text, &mut points);

        dedup_in_order(&mut points);
        points.truncate(self.config.max_points);

        debug!("Found {} pain points for {}", points.len(), page.url);
        points
    }

    /// Rule-based analysis plus LLM suggestions when a client is available.
    /// LLM failure degrades to the rule-based result.
    pub async fn analyze_with_llm(
        &self,
        page: &PageContent,
        llm: Option<&LlmClient>,
    ) -> Vec<String> {
        let mut points = self.analyze(page);

        if let Some(client) = llm {
            match client.suggest_pain_points(&page.url, &page.html).await {
                Ok(suggestions) => points.extend(suggestions),
                Err(e) => warn!("LLM pain analysis failed for {}: {}", page.url, e),
            }
        }

        dedup_in_order(&mut points);
        points.truncate(self.config.max_points);
        points
    }

    fn structural_checks(&self, page: &PageContent, points: &mut Vec<String>) {
        if !page.final_url.starts_with("https://") {
            points.push("Site is served over plain HTTP without SSL".to_string());
        }

        let document = Html::parse_document(&page.html);

        let viewport = Selector::parse(r#"meta[name="viewport"]"#).unwrap();
        if document.select(&viewport).next().is_none() {
            points.push("No mobile viewport meta tag, likely renders poorly on phones".to_string());
        }

        if !has_analytics(&document) {
            points.push("No analytics tooling detected, traffic is not being measured".to_string());
        }

        let missing_alt = count_images_missing_alt(&document);
        if missing_alt > self.config.alt_text_threshold {
            points.push(format!(
                "{} images missing alt text, hurting accessibility and SEO",
                missing_alt
            ));
        }
    }
}

/// Strip tags and collapse whitespace; keyword scans run on this
fn normalize_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    collapsed.trim().to_lowercase()
}

fn has_analytics(document: &Html) -> bool {
    let scripts = Selector::parse("script").unwrap();

    for element in document.select(&scripts) {
        if let Some(src) = element.value().attr("src") {
            if ANALYTICS_SIGNATURES.iter().any(|sig| src.contains(sig)) {
                return true;
            }
        }
        let inline = element.text().collect::<String>();
        if ANALYTICS_SIGNATURES.iter().any(|sig| inline.contains(sig)) {
            return true;
        }
    }

    false
}

fn count_images_missing_alt(document: &Html) -> usize {
    let images = Selector::parse("img").unwrap();

    document
        .select(&images)
        .filter(|img| {
            img.value()
                .attr("alt")
                .map(|alt| alt.trim().is_empty())
                .unwrap_or(true)
        })
        .count()
}

/// Keywords found in the copy, skipping occurrences negated shortly before
/// ("never slow service" does not count)
fn keyword_hits(text: &str, points: &mut Vec<String>) {
    for keyword in PAIN_KEYWORDS {
        let mut start = 0;
        while let Some(offset) = text[start..].find(keyword) {
            let pos = start + offset;
            if !negated_before(text, pos) {
                points.push(format!("Site copy mentions \"{}\"", keyword));
                break;
            }
            start = pos + keyword.len();
        }
    }
}

/// Sentences containing a problem word, truncated, negated ones skipped
fn problem_sentences(text: &str, points: &mut Vec<String>) {
    for sentence in text.split(['.', '\n']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        let hit = PROBLEM_WORDS
            .iter()
            .filter_map(|w| sentence.find(w).map(|pos| (pos, *w)))
            .min_by_key(|(pos, _)| *pos);

        if let Some((pos, _)) = hit {
            if negated_before(sentence, pos) {
                continue;
            }
            let truncated: String = sentence.chars().take(SENTENCE_TRUNCATE).collect();
            points.push(truncated);
        }
    }
}

/// True when a negation word appears within the three words immediately
/// before the match position.
fn negated_before(text: &str, pos: usize) -> bool {
    let window = &text[..pos];
    window
        .split_whitespace()
        .rev()
        .take(3)
        .any(|word| {
            let word = word.trim_matches(|c: char| !c.is_ascii_alphanumeric());
            NEGATION_WORDS.contains(&word)
        })
}

fn dedup_in_order(points: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    points.retain(|p| seen.insert(p.clone()));
}
