//! Babblr API server.
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-ant-... cargo run -p babblr-web
//! LLM_PROVIDER=ollama OLLAMA_MODEL=llama3.2 cargo run -p babblr-web
//! cargo run -p babblr-web -- --api-port 8080 --dev-mode
//! ```
//!
//! Settings are read from flags, then the environment, then `.env`; see
//! `babblr --help`.

use babblr_web::{AppState, Settings, WebConfig, spawn_web};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), String> {
    let settings = Settings::load();

    let default_filter = if settings.dev_mode {
        "info,babblr=debug,babblr_web=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Babblr API v{} (provider: {}, database: {})",
        env!("CARGO_PKG_VERSION"),
        settings.llm_provider,
        settings.database_url
    );

    let config = WebConfig::from_settings(&settings)
        .await
        .map_err(|e| e.to_string())?;
    let state = AppState::from_settings(settings).map_err(|e| e.to_string())?;
    let addr = spawn_web(state, config).await.map_err(|e| e.to_string())?;
    info!("Listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {e}"))?;
    info!("Shutting down");
    Ok(())
}
