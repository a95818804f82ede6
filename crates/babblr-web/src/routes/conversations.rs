//! Conversation CRUD.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use babblr::CefrLevel;
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::db::models::{ConversationRow, MessageView};
use crate::db::{self, find_conversation};
use crate::error::ApiError;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

/// Request body for POST /conversations.
#[derive(Deserialize, Debug)]
pub struct CreateConversation {
    pub language: String,
    pub difficulty_level: String,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// POST /conversations — Start a conversation.
///
/// Legacy level names are accepted and stored as their CEFR code. Returns
/// 201, or 422 for a blank language or an unknown level.
pub async fn create(
    State(app): State<AppState>,
    body: Result<Json<CreateConversation>, JsonRejection>,
) -> Result<(StatusCode, Json<ConversationRow>), ApiError> {
    let Json(body) = body?;

    let language = body.language.trim().to_string();
    if language.is_empty() {
        return Err(ApiError::Unprocessable("language must not be empty".into()));
    }
    let level = CefrLevel::parse_strict(&body.difficulty_level)?;
    let topic = body
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let row = db::run(&app.pool, move |conn| {
        Ok(db::insert_conversation(
            conn,
            &language,
            level.code(),
            topic.as_deref(),
        )?)
    })
    .await?;

    info!(
        "Created conversation {} ({}, {})",
        row.id, row.language, row.difficulty_level
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /conversations — Most recently active first.
pub async fn list(
    State(app): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ConversationRow>>, ApiError> {
    let Query(params) = params?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let rows = db::run(&app.pool, move |conn| {
        Ok(db::list_conversations(conn, limit)?)
    })
    .await?;
    Ok(Json(rows))
}

/// GET /conversations/{id}
pub async fn get(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ConversationRow>, ApiError> {
    let Path(id) = id?;
    let row = db::run(&app.pool, move |conn| {
        find_conversation(conn, id)?.ok_or_else(ApiError::conversation_not_found)
    })
    .await?;
    Ok(Json(row))
}

/// DELETE /conversations/{id} — Removes its messages and corrections too.
pub async fn delete(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let deleted = db::run(&app.pool, move |conn| Ok(db::delete_conversation(conn, id)?)).await?;
    if !deleted {
        return Err(ApiError::conversation_not_found());
    }
    info!("Deleted conversation {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /conversations/{id}/messages — Creation order, with corrections.
pub async fn messages(
    State(app): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let Path(id) = id?;
    let views = db::run(&app.pool, move |conn| {
        let conversation =
            find_conversation(conn, id)?.ok_or_else(ApiError::conversation_not_found)?;
        Ok(db::load_messages(conn, &conversation)?)
    })
    .await?;
    Ok(Json(views))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_topic_is_optional() {
        let body: CreateConversation =
            serde_json::from_str(r#"{"language": "Spanish", "difficulty_level": "beginner"}"#)
                .unwrap();
        assert_eq!(body.language, "Spanish");
        assert!(body.topic.is_none());
    }
}
