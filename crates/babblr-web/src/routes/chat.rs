//! Tutor chat turns.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use babblr::prompt::{MAX_COMMON_ERRORS, MAX_RECENT_VOCAB, PromptContext};
use babblr::tutor::Correction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::db::models::{CorrectionRow, MessageView};
use crate::db::{self, Exchange, find_conversation};
use crate::error::ApiError;

/// Past corrections read to personalize the prompt.
const CORRECTION_LOOKBACK: i64 = 50;

/// Request body for POST /chat.
#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    pub conversation_id: i32,
    pub user_message: String,
}

#[derive(Serialize, Debug)]
pub struct ChatResponse {
    pub user_message: MessageView,
    pub assistant_message: MessageView,
    pub corrections: Vec<Correction>,
}

/// POST /chat — Correct the student's message, reply as the tutor and store
/// both.
///
/// A failing correction pass is logged and treated as "no corrections"; a
/// failing tutor reply fails the request and nothing is stored.
pub async fn chat(
    State(app): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = body?;
    let user_text = body.user_message.trim().to_string();
    if user_text.is_empty() {
        return Err(ApiError::Unprocessable("user_message must not be empty".into()));
    }

    let conversation_id = body.conversation_id;
    let (conversation, history, past) = db::run(&app.pool, move |conn| {
        let conversation = find_conversation(conn, conversation_id)?
            .ok_or_else(ApiError::conversation_not_found)?;
        let history = db::load_history(conn, &conversation)?;
        let past = db::recent_corrections(conn, conversation_id, CORRECTION_LOOKBACK)?;
        Ok((conversation, history, past))
    })
    .await?;

    debug!(
        "Chat turn for conversation {} ({} prior messages)",
        conversation.id,
        history.len()
    );

    let corrections = match app
        .tutor
        .correct(
            &user_text,
            &conversation.language,
            &conversation.difficulty_level,
        )
        .await
    {
        Ok(found) => found,
        Err(e) => {
            warn!("Correction failed for conversation {}: {e}", conversation.id);
            Vec::new()
        }
    };

    let (recent_vocab, common_errors) = learner_profile(&past);
    let ctx = PromptContext {
        language: conversation.language.clone(),
        level: conversation.difficulty_level.clone(),
        topic: conversation.topic.clone(),
        recent_vocab,
        common_errors,
    };
    let reply = app.tutor.reply(&ctx, &history, &user_text).await?;

    let found = corrections.clone();
    let Exchange {
        user_message,
        assistant_message,
    } = db::run(&app.pool, move |conn| {
        Ok(db::record_exchange(
            conn,
            conversation_id,
            &user_text,
            &found,
            &reply,
        )?)
    })
    .await?;

    info!(
        "Conversation {}: stored turn with {} correction(s)",
        conversation_id,
        corrections.len()
    );
    Ok(Json(ChatResponse {
        user_message,
        assistant_message,
        corrections,
    }))
}

/// Corrected forms and explanations of past mistakes, newest first and
/// without repeats, capped for the prompt.
fn learner_profile(past: &[CorrectionRow]) -> (Vec<String>, Vec<String>) {
    let mut vocab: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    for row in past {
        let corrected = row.corrected.trim();
        if !corrected.is_empty()
            && vocab.len() < MAX_RECENT_VOCAB
            && !vocab.iter().any(|v| v == corrected)
        {
            vocab.push(corrected.to_string());
        }
        let explanation = row.explanation.trim();
        if !explanation.is_empty()
            && errors.len() < MAX_COMMON_ERRORS
            && !errors.iter().any(|e| e == explanation)
        {
            errors.push(explanation.to_string());
        }
    }
    (vocab, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i32, corrected: &str, explanation: &str) -> CorrectionRow {
        CorrectionRow {
            id,
            message_id: 1,
            original: "x".into(),
            corrected: corrected.into(),
            explanation: explanation.into(),
            correction_type: "grammar".into(),
        }
    }

    #[test]
    fn profile_dedups_and_keeps_order() {
        let past = [
            row(3, "estoy", "Use estar for states."),
            row(2, "estoy", "Use estar for states."),
            row(1, "la mesa", ""),
        ];
        let (vocab, errors) = learner_profile(&past);
        assert_eq!(vocab, ["estoy", "la mesa"]);
        assert_eq!(errors, ["Use estar for states."]);
    }

    #[test]
    fn profile_is_capped() {
        let past: Vec<_> = (0..30)
            .map(|i| row(i, &format!("w{i}"), &format!("e{i}")))
            .collect();
        let (vocab, errors) = learner_profile(&past);
        assert_eq!(vocab.len(), MAX_RECENT_VOCAB);
        assert_eq!(errors.len(), MAX_COMMON_ERRORS);
        assert_eq!(vocab[0], "w0");
    }
}
