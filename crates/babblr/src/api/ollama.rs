//! Ollama provider (`POST /api/chat`, non-streaming).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::api_error;
use super::{GenerateRequest, LlmFuture, LlmProvider, LlmResponse, RetryConfig, TokenUsage};
use crate::error::{Error, Result};

#[derive(Serialize, Debug)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize, Debug)]
struct OllamaChatResponse {
    model: Option<String>,
    message: Option<OllamaReply>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OllamaReply {
    content: String,
}

/// Client for a local or remote Ollama server.
pub struct OllamaProvider {
    client: reqwest::Client,
    chat_url: String,
    model: String,
    retry: RetryConfig,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("babblr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.into(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_body<'a>(&'a self, request: &'a GenerateRequest) -> OllamaChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(OllamaMessage {
                role: "system",
                content: &request.system_prompt,
            });
        }
        messages.extend(request.messages.iter().map(|m| OllamaMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    async fn send(&self, request: &GenerateRequest) -> Result<LlmResponse> {
        let body = self.build_body(request);
        debug!(
            "Ollama request: url={}, model={}, messages={}",
            self.chat_url,
            self.model,
            body.messages.len()
        );

        let start = Instant::now();
        let resp = self.client.post(&self.chat_url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(
            "Ollama response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(api_error("Ollama", status, text));
        }
        parse_response(&text, &self.model)
    }
}

fn parse_response(text: &str, requested_model: &str) -> Result<LlmResponse> {
    let parsed: OllamaChatResponse = serde_json::from_str(text)?;
    if let Some(message) = parsed.error {
        return Err(Error::Api {
            provider: "Ollama",
            status: 200,
            body: message,
        });
    }

    let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
        (None, None) => None,
        (input, output) => Some(TokenUsage {
            input_tokens: input.unwrap_or(0),
            output_tokens: output.unwrap_or(0),
        }),
    };

    Ok(LlmResponse {
        content: parsed.message.map(|m| m.content).unwrap_or_default(),
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
        usage,
        stop_reason: parsed.done_reason,
    })
}

impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> LlmFuture<'a> {
        Box::pin(async move { self.retry.run("Ollama request", || self.send(request)).await })
    }
}
