//! Babblr API server.
//!
//! `babblr-web` exposes the tutoring services from the [`babblr`] crate over
//! a REST API: conversations stored in SQLite, tutor chat with grammar
//! corrections, and speech-to-text with context-aware correction.
//!
//! # Quick start
//!
//! ```ignore
//! use babblr_web::{AppState, Settings, WebConfig, spawn_web};
//!
//! let settings = Settings::load();
//! let state = AppState::from_settings(settings.clone())?;
//! let config = WebConfig::from_settings(&settings).await?;
//! let addr = spawn_web(state, config).await?;
//! println!("API: http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! HTTP ──▶ routes::* ──▶ TutorService / SttCorrectionService / Transcriber
//!               │                       │
//!               ▼                       ▼
//!        db (Diesel, r2d2)       LlmProvider (Claude | Ollama)
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
mod server;

pub use config::Settings;
pub use error::ApiError;
pub use server::build_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use babblr::api::{LlmProvider, UnconfiguredProvider, build_provider};
use babblr::prompt::TemplateRegistry;
use babblr::speech::{SttCorrectionService, Transcriber, WhisperClient};
use babblr::tutor::TutorService;
use tracing::warn;

use crate::db::DbPool;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pool: DbPool,
    pub templates: Arc<TemplateRegistry>,
    pub tutor: TutorService,
    pub stt_correction: SttCorrectionService,
    pub transcriber: Arc<dyn Transcriber>,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn new(
        settings: Settings,
        pool: DbPool,
        templates: Arc<TemplateRegistry>,
        provider: Arc<dyn LlmProvider>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        let stt_correction =
            SttCorrectionService::new(provider.clone()).with_dev_mode(settings.dev_mode);
        Self {
            tutor: TutorService::new(provider, templates.clone()),
            stt_correction,
            settings: Arc::new(settings),
            pool,
            templates,
            transcriber,
        }
    }

    /// Open the database, load templates and build the configured provider
    /// and Whisper client.
    pub fn from_settings(settings: Settings) -> Result<Self, StartupError> {
        let pool = db::create_pool(&settings.database_url)
            .map_err(|e| StartupError::Database(e.to_string()))?;
        db::run_migrations(&pool).map_err(|e| StartupError::Database(e.to_string()))?;

        let templates = match &settings.prompts_dir {
            Some(dir) => TemplateRegistry::from_dir(dir)?,
            None => TemplateRegistry::embedded()?,
        };

        let provider = match build_provider(settings.llm_provider, &settings.provider_settings()) {
            Ok(provider) => provider,
            Err(babblr::Error::NotConfigured(missing)) => {
                warn!("{missing} is not set; {} requests will fail", settings.llm_provider);
                Arc::new(UnconfiguredProvider::new(settings.llm_provider, missing))
            }
            Err(e) => return Err(e.into()),
        };
        let transcriber = WhisperClient::new(
            &settings.whisper_api_url,
            settings.openai_api_key.clone(),
            &settings.whisper_model,
        )?;

        Ok(Self::new(
            settings,
            pool,
            Arc::new(templates),
            provider,
            Arc::new(transcriber),
        ))
    }
}

/// Why the server could not start.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("database setup failed: {0}")]
    Database(String),

    #[error(transparent)]
    Babblr(#[from] babblr::Error),

    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Configuration for the HTTP listener.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:8000`.
    pub bind_addr: SocketAddr,
    /// Frontend build served for paths no route matches.
    ///
    /// If `None`, only the API is served and the frontend runs separately
    /// (e.g. the Vite dev server on port 5173).
    pub static_dir: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            static_dir: None,
        }
    }
}

impl WebConfig {
    /// Resolve `api_host:api_port`; the host may be a name such as `localhost`.
    pub async fn from_settings(settings: &Settings) -> Result<Self, StartupError> {
        let target = format!("{}:{}", settings.api_host, settings.api_port);
        let bind_addr = tokio::net::lookup_host(&target)
            .await
            .map_err(|source| StartupError::Bind {
                addr: target.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| StartupError::Bind {
                addr: target.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "host resolved to no addresses",
                ),
            })?;
        Ok(Self {
            bind_addr,
            static_dir: settings.static_dir.clone(),
        })
    }
}

/// Spawn the API server on a Tokio task.
///
/// Returns the bound address; with port 0 this is the port the OS picked.
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(state: AppState, config: WebConfig) -> Result<SocketAddr, StartupError> {
    let router = server::build_router(state, config.static_dir);
    server::start_server(router, config.bind_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.bind_addr.to_string(),
            source,
        })
}
