//! Chat-completion boundary.
//!
//! [`ChatModel`] is the black box "messages in, text out". [`OpenAIChat`]
//! talks to the OpenAI chat completions endpoint; [`chat_with_retry`] wraps
//! any model with the attempt loop callers rely on and never fails.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ChatConfig;
use crate::prompt::{clean_plain_text, ChatMessage};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct OpenAIChat {
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// # Errors
    ///
    /// Fails if `OPENAI_API_KEY` is not set or the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key,
            client,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        request_body(&self.model, self.max_tokens, self.temperature, messages)
    }
}

/// Request JSON for the chat completions endpoint.
///
/// `gpt-5*` models take `max_completion_tokens` and no temperature; older
/// models take `max_tokens` and `temperature`.
pub fn request_body(
    model: &str,
    max_tokens: u32,
    temperature: f32,
    messages: &[ChatMessage],
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
    });
    if model.starts_with("gpt-5") {
        body["max_completion_tokens"] = max_tokens.into();
    } else {
        body["max_tokens"] = max_tokens.into();
        body["temperature"] = serde_json::json!(temperature);
    }
    body
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        Ok(extract_answer(&json))
    }
}

/// Answer text of a chat completions response.
///
/// Handles plain string content, content given as a list of text parts, and
/// refusals. Anything else yields an empty string.
pub fn extract_answer(json: &Value) -> String {
    let Some(message) = json.pointer("/choices/0/message") else {
        return String::new();
    };

    match message.get("content") {
        Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
        Some(Value::Array(parts)) => {
            let text: Vec<&str> = parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(_) => p.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect();
            let joined = text.join("\n");
            if !joined.trim().is_empty() {
                return joined.trim().to_string();
            }
        }
        _ => {}
    }

    message
        .get("refusal")
        .and_then(Value::as_str)
        .map(|r| r.trim().to_string())
        .unwrap_or_default()
}

/// Call `model` up to `max_attempts` times and return the first non-empty
/// answer with markdown stripped. Returns an empty string if every attempt
/// errors or comes back empty.
pub async fn chat_with_retry(
    model: &dyn ChatModel,
    messages: &[ChatMessage],
    label: &str,
    max_attempts: u32,
) -> String {
    let attempts = max_attempts.max(1);

    for attempt in 1..=attempts {
        match model.complete(messages).await {
            Ok(answer) => {
                let cleaned = clean_plain_text(&answer);
                if !cleaned.is_empty() {
                    return cleaned;
                }
                error!(
                    "[GPT] {}: empty answer from {} (attempt {}/{})",
                    label,
                    model.model_name(),
                    attempt,
                    attempts
                );
            }
            Err(e) => error!(
                "[GPT] {}: {} failed (attempt {}/{}): {:#}",
                label,
                model.model_name(),
                attempt,
                attempts,
                e
            ),
        }
    }

    info!("[GPT] {}: no answer after {} attempts", label, attempts);
    String::new()
}
