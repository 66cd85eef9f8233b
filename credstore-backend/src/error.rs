use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

type PasswordError = credstore_auth::PasswordError;
type SqlxError = sqlx::Error;

/// Message returned to clients for every infrastructure failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Top-level API error shared by all route handlers.
///
/// Expected outcomes (bad credentials, taken usernames, missing fields) are
/// regular responses, not errors. What lands here is either an access
/// decision or an infrastructure failure whose details stay in the log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error("password hashing error: {0}")]
    Password(#[from] PasswordError),
    #[error("upload storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("unauthorized")]
    Unauthorized,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Sqlx(_) | ApiError::Password(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Text safe to show a client.
    fn public_message(&self) -> &str {
        match self {
            ApiError::BadRequest(message) => message,
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not found",
            ApiError::UnsupportedMediaType(_) => "unsupported media type",
            ApiError::Unauthorized => "unauthorized",
            _ => INTERNAL_ERROR_MESSAGE,
        }
    }

    fn log(&self) {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
    }

    /// Render the error as a small HTML page for the browser-facing endpoints.
    pub fn into_html_response(self) -> Response {
        self.log();
        let status = self.status();
        let title = match status {
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            _ => "Internal Server Error",
        };
        let body = format!(
            "<html><head><title>{title}</title></head>\
             <body><h1>{title}</h1><p>{}</p></body></html>",
            self.public_message()
        );
        (status, Html(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let payload = json!({ "success": false, "message": self.public_message() });
        (self.status(), Json(payload)).into_response()
    }
}
