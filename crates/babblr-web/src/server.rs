//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, warn};

use crate::AppState;
use crate::routes::{chat, conversations, health, stt, tts};

/// Largest accepted request body (audio uploads).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the full axum router.
///
/// The router serves:
/// - the REST API (conversations, chat, STT, TTS voices, health)
/// - optional static files for the frontend production build
pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let origins: Vec<HeaderValue> = state
        .settings
        .cors_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    // Credentials rule out wildcards, so methods and headers mirror the request.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let mut router = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route(
            "/conversations",
            get(conversations::list).post(conversations::create),
        )
        .route(
            "/conversations/{id}",
            get(conversations::get).delete(conversations::delete),
        )
        .route("/conversations/{id}/messages", get(conversations::messages))
        .route("/chat", post(chat::chat))
        .route("/stt/transcribe", post(stt::transcribe))
        .route("/stt/languages", get(stt::languages))
        .route("/stt/models", get(stt::models))
        .route("/tts/languages", get(tts::languages))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(cors)
}

/// Bind `bind_addr`, serve `router` on a background task and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Server stopped: {e}");
        }
    });

    Ok(addr)
}
