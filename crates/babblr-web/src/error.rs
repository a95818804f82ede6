//! HTTP error responses.
//!
//! Every failure leaves a handler as an [`ApiError`] and is rendered as
//! `{"detail": "..."}`, the body shape the frontend already parses.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use diesel::r2d2::PoolError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database unavailable: {0}")]
    Pool(#[from] PoolError),

    #[error("{0}")]
    Internal(String),

    #[error("language model request failed: {0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn conversation_not_found() -> Self {
        ApiError::NotFound("Conversation not found".to_string())
    }
}

impl From<babblr::Error> for ApiError {
    fn from(e: babblr::Error) -> Self {
        use babblr::Error as E;
        match e {
            E::NotConfigured(_) => ApiError::Unavailable(e.to_string()),
            E::InvalidLevel(_) => ApiError::Unprocessable(e.to_string()),
            E::Template(_) | E::Io(_) | E::Json(_) | E::InvalidRole(_) => {
                ApiError::Internal(e.to_string())
            }
            E::Http(_) | E::Api { .. } | E::Timeout(_) | E::EmptyResponse => {
                ApiError::Upstream(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Unprocessable(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::Unprocessable(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Unprocessable(r.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(r: MultipartRejection) -> Self {
        ApiError::BadRequest(r.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("{self}");
            } else {
                warn!("{self}");
            }
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
