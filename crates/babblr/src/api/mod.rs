//! Language-model providers.
//!
//! Every service talks to the model through the [`LlmProvider`] trait, so the
//! tutor and the STT corrector work unchanged against Claude, a local Ollama
//! model, or a scripted provider in tests.
//!
//! - [`claude`] — Anthropic Messages API.
//! - [`ollama`] — Ollama `/api/chat`, non-streaming.
//! - [`retry`] — exponential backoff for transient failures.

pub mod claude;
#[cfg(test)]
pub(crate) mod mock;
pub mod ollama;
pub mod retry;

pub use claude::ClaudeProvider;
pub use ollama::OllamaProvider;
pub use retry::RetryConfig;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder shipped in `.env.example`; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_anthropic_api_key_here";

/// Default Claude model.
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";

/// Boxed future returned by [`LlmProvider::generate`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<LlmResponse>> + Send + 'a>>;

// ── Message types ──────────────────────────────────────────────────

/// Who wrote a conversation message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

/// One turn of conversation history.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub messages: Vec<ChatMessage>,
    /// Empty means no system prompt.
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A provider's answer, normalized across APIs.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub stop_reason: Option<String>,
}

// ── Provider trait ─────────────────────────────────────────────────

/// A chat-completion backend.
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Generate one assistant reply.
    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> LlmFuture<'a>;
}

/// Which provider to build.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(Error::NotConfigured(format!("LLM provider '{other}'"))),
        }
    }
}

/// Everything needed to construct any provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub anthropic_api_key: Option<String>,
    pub claude_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            claude_model: DEFAULT_CLAUDE_MODEL.to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            timeout: Duration::from_secs(120),
            retry: RetryConfig::with_retries(2),
        }
    }
}

/// Whether `key` is a real API key rather than missing or the placeholder.
pub fn api_key_configured(key: Option<&str>) -> bool {
    key.map(str::trim)
        .is_some_and(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
}

/// Build the provider selected by `kind`.
pub fn build_provider(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<Arc<dyn LlmProvider>> {
    match kind {
        ProviderKind::Claude => {
            let key = settings.anthropic_api_key.as_deref();
            if !api_key_configured(key) {
                return Err(Error::NotConfigured("ANTHROPIC_API_KEY".to_string()));
            }
            let provider = ClaudeProvider::new(
                key.unwrap_or_default(),
                &settings.claude_model,
                settings.timeout,
            )?
            .with_retry(settings.retry.clone());
            Ok(Arc::new(provider))
        }
        ProviderKind::Ollama => {
            let provider = OllamaProvider::new(
                &settings.ollama_base_url,
                &settings.ollama_model,
                settings.timeout,
            )?
            .with_retry(settings.retry.clone());
            Ok(Arc::new(provider))
        }
    }
}

/// Stand-in for a provider whose credentials are missing.
///
/// Lets the server start without an API key; every request fails with
/// [`Error::NotConfigured`].
pub struct UnconfiguredProvider {
    kind: ProviderKind,
    missing: String,
}

impl UnconfiguredProvider {
    pub fn new(kind: ProviderKind, missing: impl Into<String>) -> Self {
        Self {
            kind,
            missing: missing.into(),
        }
    }
}

impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn model(&self) -> &str {
        ""
    }

    fn generate<'a>(&'a self, _request: &'a GenerateRequest) -> LlmFuture<'a> {
        Box::pin(async move { Err(Error::NotConfigured(self.missing.clone())) })
    }
}
