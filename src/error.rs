//! Agent error types with HTTP status code mapping.
//!
//! [`AgentError`] is the central error type of the crate. Each variant
//! maps to a specific HTTP status code and structured JSON error response,
//! so host applications can return it straight from their handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Message used for every "not found" response.
pub const NOT_FOUND: &str = "Not found";

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// SQLSTATEs raised by values the client sent: `not_null_violation`,
/// `check_violation`, `string_data_right_truncation`,
/// `numeric_value_out_of_range` and `invalid_text_representation`.
const INVALID_INPUT: &[&str] = &["23502", "23514", "22001", "22003", "22P02"];

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "not found: id",
///     "details": { "field": "id", "message": "Not found" }
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Crate-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                  |
/// |-----------|------------------|------------------------------|
/// | 1000–1999 | Validation       | 400 Bad Request              |
/// | 2000–2999 | Not Found/State  | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server           | 500 Internal Server Error    |
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// No object matched the lookup on `field`.
    #[error("not found: {field}")]
    NotFound {
        /// Field used for the lookup (usually `id`).
        field: String,
        /// Message shown to the client.
        message: String,
    },

    /// Request payload failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Query filter or ordering is not valid for the model.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A unique or foreign key constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database driver failure.
    #[error("database error: {0}")]
    Database(String),

    /// Embedded migrations could not be applied.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Password hashing failed.
    #[error("password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Builds a [`AgentError::NotFound`] for the given lookup field.
    #[must_use]
    pub fn not_found(field: impl Into<String>) -> Self {
        Self::NotFound {
            field: field.into(),
            message: NOT_FOUND.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidFilter(_) => 1002,
            Self::NotFound { .. } => 2001,
            Self::Conflict(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Database(_) => 3001,
            Self::Migration(_) => 3002,
            Self::PasswordHash(_) => 3003,
            Self::Config(_) => 3004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_)
            | Self::Migration(_)
            | Self::PasswordHash(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound { field, message } => Some(serde_json::json!({
                "field": field,
                "message": message,
            })),
            _ => None,
        }
    }
}

impl AgentError {
    /// Classifies a Postgres error by SQLSTATE. Returns `None` for codes
    /// that point at the server rather than the request.
    fn from_sqlstate(code: &str, message: &str) -> Option<Self> {
        match code {
            UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION => Some(Self::Conflict(message.to_string())),
            c if INVALID_INPUT.contains(&c) => Some(Self::InvalidRequest(message.to_string())),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(mapped) = db_err
                .code()
                .and_then(|code| Self::from_sqlstate(&code, db_err.message()))
            {
                return mapped;
            }
        }
        Self::Database(err.to_string())
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
