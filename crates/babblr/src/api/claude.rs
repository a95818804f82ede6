//! Anthropic Messages API provider.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::retry::api_error;
use super::{
    ChatMessage, GenerateRequest, LlmFuture, LlmProvider, LlmResponse, RetryConfig, TokenUsage,
};
use crate::error::{Error, Result};

pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<TokenUsage>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

impl MessagesResponse {
    /// Concatenate every text block; tool-use and other blocks are ignored.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

/// Async client for Claude.
pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    retry: RetryConfig,
}

impl ClaudeProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("babblr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, request: &GenerateRequest) -> Result<LlmResponse> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: Some(request.system_prompt.as_str()).filter(|s| !s.is_empty()),
            messages: &request.messages,
            temperature: request.temperature,
        };
        debug!(
            "Claude request: model={}, messages={}, max_tokens={}, temp={}",
            self.model,
            request.messages.len(),
            request.max_tokens,
            request.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "Claude response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(api_error("Claude", status, text));
        }
        parse_response(&text, &self.model)
    }
}

fn parse_response(text: &str, requested_model: &str) -> Result<LlmResponse> {
    let parsed: MessagesResponse = serde_json::from_str(text)?;
    if let Some(err) = &parsed.error {
        return Err(Error::Api {
            provider: "Claude",
            status: 200,
            body: err.message.clone(),
        });
    }

    if let Some(usage) = parsed.usage {
        debug!(
            "Token usage: input={}, output={}",
            usage.input_tokens, usage.output_tokens
        );
    }

    Ok(LlmResponse {
        content: parsed.text(),
        model: parsed
            .model
            .clone()
            .unwrap_or_else(|| requested_model.to_string()),
        usage: parsed.usage,
        stop_reason: parsed.stop_reason,
    })
}

impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> LlmFuture<'a> {
        Box::pin(async move { self.retry.run("Claude request", || self.send(request)).await })
    }
}
