//! Liveness and service status.

use axum::Json;
use axum::extract::State;
use babblr::api::api_key_configured;
use diesel::RunQueryDsl;
use serde_json::{Value, json};
use tracing::warn;

use crate::AppState;
use crate::db;

/// GET / — Liveness probe.
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "Babblr API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health — Database reachability and which services are configured.
pub async fn health(State(app): State<AppState>) -> Json<Value> {
    let database = match db::run(&app.pool, |conn| {
        diesel::sql_query("SELECT 1").execute(conn)?;
        Ok(())
    })
    .await
    {
        Ok(()) => "connected",
        Err(e) => {
            warn!("Health check could not reach the database: {e}");
            "unavailable"
        }
    };

    let settings = &app.settings;
    let status = if database == "connected" { "healthy" } else { "degraded" };
    let whisper = if app.transcriber.is_available() {
        "available"
    } else {
        "not configured"
    };
    let claude = if api_key_configured(settings.anthropic_api_key.as_deref()) {
        "configured"
    } else {
        "not configured"
    };

    Json(json!({
        "status": status,
        "database": database,
        "llm_provider": settings.llm_provider,
        "model": app.tutor.provider().model(),
        "templates": app.templates.iter().count(),
        "services": {
            "whisper": whisper,
            "claude": claude,
            // Ollama is only reachable-or-not at request time.
            "ollama": "configured",
            "tts": "available",
        },
    }))
}
