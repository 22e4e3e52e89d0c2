//! Error types for the strengthlog service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur when loading the strength standards table.
#[derive(Debug, Error)]
pub enum StandardsError {
    #[error("cannot read standards file {path}: {source}")]
    CannotRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid standards format: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    #[error("thresholds for {exercise} must increase from Bronze to Apex")]
    NonMonotonic { exercise: String },
}

/// A chart window length other than 7, 30 or 90 days.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("window must be 7, 30 or 90 days, got {0}")]
pub struct InvalidWindow(pub u32);

/// Errors from password hashing and token handling.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Errors from the language model collaborator.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured")]
    NotConfigured,

    #[error("request to language model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model returned no content")]
    EmptyReply,

    #[error("generated plan is malformed: {0}")]
    MalformedPlan(String),
}

/// Errors surfaced by HTTP handlers.
///
/// Each variant maps to a status code and a `{"error": ...}` body. Server-side
/// details are logged and replaced with a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authorization denied")]
    MissingToken,

    #[error("Token is not valid")]
    InvalidToken,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{message}")]
    Upstream {
        message: &'static str,
        source: LlmError,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ApiError::MissingToken | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Token(_) => ApiError::InvalidToken,
            AuthError::Hash(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Database(e) => {
                log::error!("Database error: {}", e);
                "Server error".to_string()
            }
            ApiError::Internal(e) => {
                log::error!("Internal error: {}", e);
                "Server error".to_string()
            }
            ApiError::Upstream { message, source } => {
                log::error!("AI Error: {}", source);
                (*message).to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
