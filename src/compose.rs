//! Outreach email drafting.
//!
//! The base draft is rendered from an askama template; the first non-blank
//! line of the render becomes the subject and the rest the body. Both pass
//! through a sanitizer that strips placeholder tokens and AI-disclosure
//! phrases, then the canonical signature is appended. An optional LLM pass
//! rewrites the body; any failure there returns the base draft untouched.

use anyhow::{Context, Result};
use askama::Template;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SenderConfig;
use crate::llm::LlmClient;

static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());
static BRACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{.*?\}").unwrap());
static ANGLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").unwrap());
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Model-emitted closings are stripped so the canonical signature is the
/// only one in the email
static SIGNATURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(best regards|best|regards|sincerely)\b[\s\S]*$").unwrap());

const AI_PHRASES: &[&str] = &[
    "as an ai language model",
    "i am an ai",
    "as an ai",
    "i'm an ai",
    "i am a language model",
    "as a language model",
];

/// Short lines consisting only of these tokens are leftover placeholders
const PLACEHOLDER_TOKENS: &[&str] = &[
    "your name",
    "your company",
    "company name",
    "your title",
    "name",
];

const LLM_SYSTEM_PROMPT: &str =
    "You are a concise, human-sounding outreach writer for local businesses. \
     Do NOT use placeholders such as bracketed tokens. \
     Do NOT mention that you are an AI. \
     Write short, plain-language emails (about 70-140 words) and end without a signature; \
     one will be appended.";

/// Everything the template needs to render a draft
#[derive(Debug, Clone)]
pub struct ComposeContext {
    pub title: String,
    pub category: String,
    pub domain: String,
    pub pain_text: String,
}

impl ComposeContext {
    /// Bullet-list rendering of pain points for the template
    pub fn pain_text_from(points: &[String]) -> String {
        points
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Finished draft; immutable once composed
#[derive(Debug, Clone)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "outreach_email.txt")]
struct EmailTemplate<'a> {
    domain: &'a str,
    title: &'a str,
    category: &'a str,
    pain_text: &'a str,
}

/// Render, sanitize, and sign the base draft
pub fn compose(ctx: &ComposeContext, sender: &SenderConfig) -> Result<EmailDraft> {
    let template = EmailTemplate {
        domain: &ctx.domain,
        title: &ctx.title,
        category: &ctx.category,
        pain_text: &ctx.pain_text,
    };

    let rendered = template.render().context("Failed to render email template")?;

    let mut lines = rendered.lines();
    let subject = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();

    let subject = sanitize(&subject);
    let body = append_signature(&sanitize(&body), sender);

    debug!("Composed draft for {} ({} chars)", ctx.domain, body.len());

    Ok(EmailDraft { subject, body })
}

/// Rewrite the draft body through the LLM. Any failure returns the input
/// draft unchanged.
pub async fn personalize(
    draft: &EmailDraft,
    ctx: &ComposeContext,
    sender: &SenderConfig,
    llm: &LlmClient,
) -> EmailDraft {
    let user_content = serde_json::json!({
        "lead": { "title": ctx.title, "domain": ctx.domain, "category": ctx.category },
        "pain_text": ctx.pain_text,
        "base_email": draft.body,
    })
    .to_string();

    let rewritten = match llm.complete(LLM_SYSTEM_PROMPT, &user_content).await {
        Ok(text) => text,
        Err(e) => {
            warn!("LLM personalization failed, keeping base draft: {}", e);
            return draft.clone();
        }
    };

    let cleaned = sanitize(&rewritten);
    // Drop any closing the model added, then sign the canonical way
    let without_signature = SIGNATURE_RE.replace(&cleaned, "").trim().to_string();
    if without_signature.is_empty() {
        warn!("LLM rewrite sanitized to nothing, keeping base draft");
        return draft.clone();
    }

    // Sanitization is done by this point; signing comes last so the
    // canonical signature is never re-filtered
    let body = append_signature(&without_signature, sender);

    EmailDraft {
        subject: draft.subject.clone(),
        body,
    }
}

/// Strip placeholder tokens, AI-disclosure phrases, and placeholder-only
/// lines; collapse blank-line runs.
fn sanitize(text: &str) -> String {
    let mut cleaned = BRACKET_RE.replace_all(text, "").to_string();
    cleaned = BRACE_RE.replace_all(&cleaned, "").to_string();
    cleaned = ANGLE_RE.replace_all(&cleaned, "").to_string();

    for phrase in AI_PHRASES {
        let pattern = Regex::new(&format!("(?i){}", regex::escape(phrase))).unwrap();
        cleaned = pattern.replace_all(&cleaned, "").to_string();
    }

    let kept: Vec<&str> = cleaned
        .lines()
        .filter(|line| {
            let stripped = line.trim();
            let lower = stripped.to_lowercase();
            !(stripped.len() < 40 && PLACEHOLDER_TOKENS.iter().any(|tok| lower.contains(tok)))
        })
        .collect();

    let joined = kept.join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

/// Signature is sender name plus website, or a generic closing when no
/// name is configured. Website loses its trailing slash.
fn append_signature(body: &str, sender: &SenderConfig) -> String {
    let website = sender.website.trim_end_matches('/');
    let name = sender.name.trim();

    let signature = if name.is_empty() {
        format!("Best regards,\n{}", website)
    } else {
        format!("Best,\n{}\n{}", name, website)
    };

    format!("{}\n\n{}", body.trim_end(), signature)
}
