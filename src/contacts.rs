//! Contact extraction from scraped pages.
//!
//! Pure and deterministic: takes HTML, returns every contact signal found.
//! All extraction passes accumulate into one set; none short-circuits.
//!
//! Sources, in order:
//! - `mailto:` hrefs (query/fragment stripped)
//! - visible-text email scan
//! - visible-text phone-token scan (normalized to digits, 7-15 accepted)
//! - `<form action>` attributes
//! - JSON-LD structured data (contactPoint/email/telephone, `@graph` recursed)
//! - microdata `itemprop="email"` / `itemprop="telephone"`
//! - obfuscated emails ("jane (at) example (dot) com") after substitution

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap());

/// Runs of digits and common phone separators; candidates only, the digit
/// count decides acceptance.
static PHONE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d\-\(\)\.\s\+]{7,20}").unwrap());

/// Bracketed "(at)" / "[at]" with optional surrounding whitespace
static OBFUSCATED_AT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\(\[]\s*at\s*[\)\]]\s*").unwrap());

/// Bracketed "(dot)" / "[dot]" with optional surrounding whitespace
static OBFUSCATED_DOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\(\[]\s*dot\s*[\)\]]\s*").unwrap());

/// Every contact signal found on a page.
///
/// Emails and phones are deduplicated by normalized form with insertion
/// order preserved, so the first email found on the page is the primary
/// outreach recipient.
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub jsonld: Vec<serde_json::Value>,
    pub form_actions: Vec<String>,
}

impl ContactSet {
    /// Primary recipient: the first email found on the page
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    fn push_email(&mut self, raw: &str) {
        let cleaned = raw.trim().trim_end_matches(['.', ',', ';', ':']).to_string();
        if cleaned.is_empty() {
            return;
        }
        // Phone fragments sometimes slip through the email pattern
        if cleaned.chars().all(|c| c.is_ascii_digit()) {
            return;
        }
        if !self.emails.iter().any(|e| e.eq_ignore_ascii_case(&cleaned)) {
            self.emails.push(cleaned);
        }
    }

    fn push_phone(&mut self, raw: &str) {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if !(7..=15).contains(&digits.len()) {
            return;
        }
        if !self.phones.contains(&digits) {
            self.phones.push(digits);
        }
    }

    fn push_form_action(&mut self, action: String) {
        if !action.is_empty() && !self.form_actions.contains(&action) {
            self.form_actions.push(action);
        }
    }
}

/// Extract all contact signals from a page. Pure; no network.
pub fn extract(html: &str, base_url: Option<&str>) -> ContactSet {
    let document = Html::parse_document(html);
    let mut set = ContactSet::default();

    extract_mailto_links(&document, &mut set);

    let visible_text = collect_visible_text(&document);
    extract_text_emails(&visible_text, &mut set);
    extract_phone_tokens(&visible_text, &mut set);

    extract_form_actions(&document, base_url, &mut set);
    extract_jsonld(&document, &mut set);
    extract_microdata(&document, &mut set);
    extract_obfuscated_emails(&visible_text, &mut set);

    debug!(
        "Extracted {} emails, {} phones, {} form actions",
        set.emails.len(),
        set.phones.len(),
        set.form_actions.len()
    );

    set
}

fn collect_visible_text(document: &Html) -> String {
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_mailto_links(document: &Html, set: &mut ContactSet) {
    let selector = Selector::parse(r#"a[href^="mailto:"]"#).unwrap();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let address = href
            .trim_start_matches("mailto:")
            .split(['?', '#'])
            .next()
            .unwrap_or("");
        let decoded = address.replace("%40", "@");
        if EMAIL_RE.is_match(&decoded) {
            set.push_email(&decoded);
        }
    }
}

fn extract_text_emails(text: &str, set: &mut ContactSet) {
    for m in EMAIL_RE.find_iter(text) {
        set.push_email(m.as_str());
    }
}

fn extract_phone_tokens(text: &str, set: &mut ContactSet) {
    for m in PHONE_TOKEN_RE.find_iter(text) {
        set.push_phone(m.as_str());
    }
}

fn extract_form_actions(document: &Html, base_url: Option<&str>, set: &mut ContactSet) {
    let selector = Selector::parse("form[action]").unwrap();

    for element in document.select(&selector) {
        let Some(action) = element.value().attr("action") else {
            continue;
        };
        let action = action.trim();
        if action.is_empty() {
            continue;
        }

        // Relative actions resolve against the page URL when we have one
        let resolved = match base_url {
            Some(base) if !action.starts_with("http://") && !action.starts_with("https://") => {
                match url::Url::parse(base).and_then(|b| b.join(action)) {
                    Ok(joined) => joined.to_string(),
                    Err(_) => action.to_string(),
                }
            }
            _ => action.to_string(),
        };
        set.push_form_action(resolved);
    }
}

fn extract_jsonld(document: &Html, set: &mut ContactSet) {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();

    for element in document.select(&selector) {
        let raw = element.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            debug!("Skipping malformed JSON-LD block");
            continue;
        };
        walk_jsonld(&value, set);
        set.jsonld.push(value);
    }
}

/// Pull email/telephone fields out of a JSON-LD value, handling string,
/// object, and list forms, and recursing into contactPoint and `@graph`.
fn walk_jsonld(value: &serde_json::Value, set: &mut ContactSet) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                walk_jsonld(item, set);
            }
        }
        serde_json::Value::Object(map) => {
            for key in ["email", "telephone"] {
                if let Some(field) = map.get(key) {
                    collect_jsonld_field(key, field, set);
                }
            }
            if let Some(contact_point) = map.get("contactPoint") {
                walk_jsonld(contact_point, set);
            }
            if let Some(graph) = map.get("@graph") {
                walk_jsonld(graph, set);
            }
        }
        _ => {}
    }
}

fn collect_jsonld_field(key: &str, field: &serde_json::Value, set: &mut ContactSet) {
    match field {
        serde_json::Value::String(s) => {
            let s = s.trim_start_matches("mailto:");
            if key == "email" {
                if EMAIL_RE.is_match(s) {
                    set.push_email(s);
                }
            } else {
                set.push_phone(s);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_jsonld_field(key, item, set);
            }
        }
        _ => {}
    }
}

fn extract_microdata(document: &Html, set: &mut ContactSet) {
    let email_selector = Selector::parse(r#"[itemprop="email"]"#).unwrap();
    let phone_selector = Selector::parse(r#"[itemprop="telephone"]"#).unwrap();

    for element in document.select(&email_selector) {
        let candidate = element
            .value()
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| element.text().collect::<String>());
        let candidate = candidate.trim().trim_start_matches("mailto:");
        if EMAIL_RE.is_match(candidate) {
            set.push_email(candidate);
        }
    }

    for element in document.select(&phone_selector) {
        let candidate = element
            .value()
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| element.text().collect::<String>());
        set.push_phone(&candidate);
    }
}

/// Substitute bracketed "(at)"/"(dot)" spellings and re-scan for emails
fn extract_obfuscated_emails(text: &str, set: &mut ContactSet) {
    if !OBFUSCATED_AT_RE.is_match(text) {
        return;
    }

    let substituted = OBFUSCATED_AT_RE.replace_all(text, "@");
    let substituted = OBFUSCATED_DOT_RE.replace_all(&substituted, ".");

    for m in EMAIL_RE.find_iter(&substituted) {
        set.push_email(m.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailto_extraction_strips_query() {
        let html = r#"<a href="mailto:sales@acme.com?subject=Hi">Email us</a>"#;
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["sales@acme.com"]);
    }

    #[test]
    fn test_text_emails_deduplicated() {
        let html = "<p>Write to info@acme.com or info@acme.com today. Also INFO@acme.com.</p>";
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["info@acme.com"]);
    }

    #[test]
    fn test_trailing_punctuation_stripped() {
        let html = "<p>Contact: support@acme.com.</p>";
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["support@acme.com"]);
    }

    #[test]
    fn test_pure_digit_candidates_rejected() {
        // A decimal-heavy string can match the email pattern's domain side
        let set = {
            let mut s = ContactSet::default();
            s.push_email("1234567890");
            s
        };
        assert!(set.emails.is_empty());
    }

    #[test]
    fn test_phone_normalized_to_digits() {
        let html = "<p>Call us: (512) 555-0142</p>";
        let set = extract(html, None);
        assert_eq!(set.phones, vec!["5125550142"]);
    }

    #[test]
    fn test_phone_too_short_rejected() {
        let html = "<p>Suite 123-45</p>";
        let set = extract(html, None);
        assert!(set.phones.is_empty());
    }

    #[test]
    fn test_phone_too_long_rejected() {
        let mut set = ContactSet::default();
        set.push_phone("1234567890123456");
        assert!(set.phones.is_empty());
    }

    #[test]
    fn test_obfuscated_email_recovered() {
        let html = "<p>Reach me at jane (at) example (dot) com for quotes.</p>";
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["jane@example.com"]);
    }

    #[test]
    fn test_jsonld_contact_point() {
        let html = r#"
            <script type="application/ld+json">
            {
                "@type": "LocalBusiness",
                "contactPoint": [
                    {"@type": "ContactPoint", "email": "owner@biz.com", "telephone": "+1-512-555-0100"}
                ]
            }
            </script>
        "#;
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["owner@biz.com"]);
        assert_eq!(set.phones, vec!["15125550100"]);
        assert_eq!(set.jsonld.len(), 1);
    }

    #[test]
    fn test_jsonld_graph_recursion() {
        let html = r#"
            <script type="application/ld+json">
            {"@graph": [{"@type": "Organization", "email": "hello@biz.com"}]}
            </script>
        "#;
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["hello@biz.com"]);
    }

    #[test]
    fn test_form_action_resolved_against_base() {
        let html = r#"<form action="/contact"><input type="text"></form>"#;
        let set = extract(html, Some("https://acme.com/about"));
        assert_eq!(set.form_actions, vec!["https://acme.com/contact"]);
    }

    #[test]
    fn test_microdata_email() {
        let html = r#"<span itemprop="email">desk@firm.net</span>"#;
        let set = extract(html, None);
        assert_eq!(set.emails, vec!["desk@firm.net"]);
    }

    #[test]
    fn test_first_email_wins_ordering() {
        let html = r#"
            <a href="mailto:first@acme.com">one</a>
            <p>second@acme.com</p>
        "#;
        let set = extract(html, None);
        assert_eq!(set.primary_email(), Some("first@acme.com"));
    }

    #[test]
    fn test_empty_page_yields_empty_set() {
        let set = extract("", None);
        assert!(set.emails.is_empty());
        assert!(set.phones.is_empty());
    }
}
