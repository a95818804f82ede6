//! Server settings from the command line, environment and `.env`.

use std::path::PathBuf;
use std::time::Duration;

use babblr::api::{DEFAULT_CLAUDE_MODEL, ProviderKind, ProviderSettings, RetryConfig};
use babblr::speech::whisper::{DEFAULT_WHISPER_API_URL, DEFAULT_WHISPER_MODEL};
use clap::Parser;
use clap::builder::BoolishValueParser;

/// Origins always allowed in addition to `frontend_url`.
pub const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5173"];

/// Babblr API server.
#[derive(Parser, Debug, Clone)]
#[command(name = "babblr", version, about = "Language-tutoring API server")]
pub struct Settings {
    /// Interface to bind.
    #[arg(long, env = "BABBLR_API_HOST", default_value = "127.0.0.1")]
    pub api_host: String,

    #[arg(long, env = "BABBLR_API_PORT", default_value_t = 8000)]
    pub api_port: u16,

    /// Frontend origin allowed by CORS.
    #[arg(long, env = "BABBLR_FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Keep uploaded audio and log STT corrections.
    #[arg(long, env = "BABBLR_DEV_MODE", value_parser = BoolishValueParser::new())]
    pub dev_mode: bool,

    /// Where dev mode stores uploaded audio.
    #[arg(long, env = "BABBLR_AUDIO_STORAGE_PATH", default_value = "./audio_storage")]
    pub audio_storage_path: PathBuf,

    /// SQLite file, or `:memory:`.
    #[arg(long, env = "BABBLR_DATABASE_URL", default_value = "babblr.db")]
    pub database_url: String,

    /// Directory of `<level>.json` files overriding the built-in templates.
    #[arg(long, env = "BABBLR_PROMPTS_DIR")]
    pub prompts_dir: Option<PathBuf>,

    /// Directory of frontend assets served for unmatched paths.
    #[arg(long, env = "BABBLR_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// `claude` or `ollama`.
    #[arg(long, env = "LLM_PROVIDER", default_value = "claude")]
    pub llm_provider: ProviderKind,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "CLAUDE_MODEL", default_value = DEFAULT_CLAUDE_MODEL)]
    pub claude_model: String,

    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    pub ollama_base_url: String,

    #[arg(long, env = "OLLAMA_MODEL", default_value = "llama3.2")]
    pub ollama_model: String,

    /// Key for the Whisper transcription API.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "WHISPER_API_URL", default_value = DEFAULT_WHISPER_API_URL)]
    pub whisper_api_url: String,

    #[arg(long, env = "WHISPER_MODEL", default_value = DEFAULT_WHISPER_MODEL)]
    pub whisper_model: String,

    /// Retries for rate-limited or overloaded model requests.
    #[arg(long, env = "LLM_MAX_RETRIES", default_value_t = 2)]
    pub llm_max_retries: u32,
}

impl Settings {
    /// Load `.env` (if present), then parse arguments and environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            anthropic_api_key: self.anthropic_api_key.clone(),
            claude_model: self.claude_model.clone(),
            ollama_base_url: self.ollama_base_url.clone(),
            ollama_model: self.ollama_model.clone(),
            timeout: Duration::from_secs(120),
            retry: RetryConfig::with_retries(self.llm_max_retries),
        }
    }

    /// `frontend_url` plus the local dev servers, without duplicates.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.trim_end_matches('/').to_string()];
        for origin in DEV_ORIGINS {
            if !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }
}
