//! Speech-to-text endpoints.

use std::path::Path;

use axum::Json;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use babblr::catalog::{LANGUAGE_VARIANTS, list_locales};
use babblr::speech::{AudioUpload, SttCorrection, WHISPER_MODELS};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::db::{self, find_conversation};
use crate::error::ApiError;

/// Multipart field carrying the audio.
pub const AUDIO_FIELD: &str = "audio";

#[derive(Deserialize, Debug, Default)]
pub struct TranscribeParams {
    /// Language hint: ISO code, locale or name.
    pub language: Option<String>,
    /// Enables context-aware correction against this conversation.
    pub conversation_id: Option<i32>,
}

#[derive(Serialize, Debug)]
pub struct TranscriptionResponse {
    pub text: String,
    pub language: String,
    pub confidence: f64,
    pub duration: f64,
    /// Present only when recognition errors were corrected.
    pub corrections: Option<Vec<SttCorrection>>,
}

/// POST /stt/transcribe — Transcribe an uploaded recording.
///
/// With `conversation_id`, the transcript is checked against the recent
/// conversation to repair misheard words.
pub async fn transcribe(
    State(app): State<AppState>,
    params: Result<Query<TranscribeParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let Query(params) = params?;
    let audio = read_audio(multipart?).await?;
    info!(
        "Received transcription request: filename={}, content_type={:?}, bytes={}, language={:?}, conversation_id={:?}",
        audio.filename,
        audio.content_type,
        audio.bytes.len(),
        params.language,
        params.conversation_id
    );

    let context = match params.conversation_id {
        Some(id) => Some(
            db::run(&app.pool, move |conn| {
                let conversation =
                    find_conversation(conn, id)?.ok_or_else(ApiError::conversation_not_found)?;
                let history = db::load_history(conn, &conversation)?;
                Ok((conversation, history))
            })
            .await?,
        ),
        None => None,
    };

    if app.settings.dev_mode {
        save_audio(&app.settings.audio_storage_path, &audio).await;
    }

    let result = app
        .transcriber
        .transcribe(audio, params.language)
        .await
        .map_err(transcription_error)?;

    let mut text = result.text;
    let mut corrections = None;
    if let Some((conversation, history)) = context
        && !history.is_empty()
    {
        let corrected = app
            .stt_correction
            .correct_transcription(
                &text,
                &history,
                &conversation.language,
                &conversation.difficulty_level,
            )
            .await;
        text = corrected.corrected_text;
        if !corrected.corrections.is_empty() {
            corrections = Some(corrected.corrections);
        }
    }

    Ok(Json(TranscriptionResponse {
        text,
        language: result.language,
        confidence: result.confidence,
        duration: result.duration,
        corrections,
    }))
}

/// Pull the `audio` part out of the form; 400 when it is missing or empty.
async fn read_audio(mut multipart: Multipart) -> Result<AudioUpload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        debug!("Audio file size: {} bytes", bytes.len());
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Empty audio file".into()));
        }
        return Ok(AudioUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest("No file provided".into()))
}

fn transcription_error(e: babblr::Error) -> ApiError {
    error!("Transcription failed: {e}");
    match e {
        babblr::Error::Timeout(_) => ApiError::Timeout(
            "Transcription timed out. Please try with a shorter audio file.".into(),
        ),
        babblr::Error::NotConfigured(_) => {
            ApiError::Unavailable("Speech-to-text service not available".into())
        }
        other => ApiError::Internal(format!("Transcription failed: {other}")),
    }
}

/// `audio_YYYYmmdd_HHMMSS` plus the upload's extension.
fn stored_audio_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("audio_{}{ext}", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Keep a copy of the upload for debugging. Failures only warn.
async fn save_audio(dir: &Path, audio: &AudioUpload) {
    let dest = dir.join(stored_audio_name(&audio.filename));
    let saved = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&dest, &audio.bytes).await
    }
    .await;
    match saved {
        Ok(()) => info!("Audio file saved in development mode: {}", dest.display()),
        Err(e) => warn!("Failed to save audio file in development mode: {e}"),
    }
}

/// GET /stt/languages — Locales Whisper can transcribe.
pub async fn languages() -> Json<Value> {
    let supported = list_locales(true);
    let languages: Vec<Value> = LANGUAGE_VARIANTS
        .iter()
        .filter(|v| supported.contains(&v.locale))
        .map(|v| {
            json!({
                "locale": v.locale,
                "iso_639_1": v.iso_639_1,
                "iso_3166_1": v.iso_3166_1,
                "name": v.name,
                "native_name": v.native_name,
                "stt": { "supported": v.stt, "whisper_language_code": v.iso_639_1 },
                "tts": { "supported": v.tts },
            })
        })
        .collect();
    Json(json!({ "count": languages.len(), "languages": languages }))
}

/// GET /stt/models — Whisper model sizes and the one in use.
pub async fn models(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "models": WHISPER_MODELS,
        "current_model": app.transcriber.model(),
        "device": "api",
        "multilingual": true,
        "notes": [
            "Whisper model selection is not language-specific (models are multilingual).",
            "You may pass a language hint as ISO-639-1 (e.g., 'en') or locale (e.g., 'en-GB'); locales map to ISO-639-1.",
        ],
        "count": WHISPER_MODELS.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_keeps_extension() {
        let name = stored_audio_name("recording.webm");
        assert!(name.starts_with("audio_"));
        assert!(name.ends_with(".webm"));
        // audio_ + YYYYmmdd_HHMMSS + .webm
        assert_eq!(name.len(), "audio_".len() + 15 + ".webm".len());
        assert!(!stored_audio_name("blob").contains('.'));
    }

    #[test]
    fn transcription_errors_map_to_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            transcription_error(babblr::Error::Timeout(30)).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            transcription_error(babblr::Error::NotConfigured("OPENAI_API_KEY".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let err = transcription_error(babblr::Error::EmptyResponse);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Transcription failed:"));
    }
}
