//! Chat-completion client used for optional email personalization and
//! pain-point augmentation.
//!
//! Thin wrapper over the OpenAI-compatible chat completions endpoint. The
//! endpoint URL is overridable so tests can point it at a mock server.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Max suggestions taken from a pain-point completion
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completion client with a fixed model and API key
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl LlmClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_endpoint(api_key, model, DEFAULT_CHAT_ENDPOINT)
    }

    pub fn with_endpoint(api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// One system + user exchange, returning the assistant text
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.6,
            max_tokens: 300,
        };

        debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Chat completion returned status {}", status));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        info!(
            model = %self.model,
            response_length = content.len(),
            "Chat completion received"
        );

        Ok(content)
    }

    /// Ask for website problems worth mentioning in outreach.
    /// Returns one suggestion per non-empty response line, capped.
    pub async fn suggest_pain_points(&self, url: &str, html: &str) -> Result<Vec<String>> {
        // Raw pages can be huge; the opening of the page carries the signal
        let excerpt: String = html.chars().take(4000).collect();

        let system = "You review small-business websites and list concrete, fixable problems. \
                      Answer with one short problem per line, no numbering, no commentary.";
        let user = format!("Website: {}\n\nHTML excerpt:\n{}", url, excerpt);

        let response = self.complete(system, &user).await?;

        Ok(response
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*', ' ']).to_string())
            .filter(|line| !line.is_empty())
            .take(MAX_SUGGESTIONS)
            .collect())
    }
}
