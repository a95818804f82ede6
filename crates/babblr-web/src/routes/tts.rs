//! Text-to-speech voice locales.
//!
//! Speech is synthesized in the browser; the server only says which locales
//! to ask the browser for.

use axum::Json;
use babblr::catalog::tts_variants;
use serde_json::{Value, json};

/// GET /tts/languages — Locales with a browser voice.
pub async fn languages() -> Json<Value> {
    let languages: Vec<Value> = tts_variants()
        .map(|v| {
            json!({
                "locale": v.locale,
                "iso_639_1": v.iso_639_1,
                "name": v.name,
                "native_name": v.native_name,
                "voice_lang": v.locale,
            })
        })
        .collect();
    Json(json!({ "count": languages.len(), "languages": languages }))
}
