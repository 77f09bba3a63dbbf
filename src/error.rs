use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use std::fmt;

// Application-wide error type
#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    ValidationError(String),
    AuthError(String),
    NotFound(String),
    /// Unique constraint hit (duplicate key on insert)
    Conflict(String),
    Timeout(String),
    /// Non-2xx answer from the companion API or PostgREST gateway
    UpstreamError { status: u16, message: String },
    InternalError(String),
}

impl AppError {
    /// Duplicate-key errors; idempotent inserts treat these as success.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Infrastructure failures that a fallback path may recover from.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::DatabaseError(_) | AppError::Timeout(_) | AppError::InternalError(_) => true,
            AppError::UpstreamError { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            AppError::UpstreamError { status, message } => write!(f, "Upstream error ({}): {}", status, message),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::UpstreamError { status: status.as_u16(), message: err.to_string() }
        } else if err.is_decode() {
            AppError::InternalError(format!("Failed to decode response: {}", err))
        } else {
            AppError::DatabaseError(format!("Request failed: {}", err))
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => AppError::Timeout(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::Conflict(db_err.message().to_string())
            }
            // Foreign key violation: the referenced post or profile does not exist
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                AppError::NotFound(db_err.message().to_string())
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::UpstreamError { message, .. } => (StatusCode::BAD_GATEWAY, message),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Convenient Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(AppError::Conflict("dup".to_string()).is_conflict());
        assert!(AppError::Timeout("slow".to_string()).is_transient());
        assert!(AppError::UpstreamError { status: 503, message: "down".to_string() }.is_transient());
        assert!(!AppError::UpstreamError { status: 400, message: "bad".to_string() }.is_transient());
        assert!(!AppError::ValidationError("empty".to_string()).is_transient());
    }

    #[test]
    fn test_error_response_status() {
        let response = AppError::NotFound("Post not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::UpstreamError { status: 500, message: "boom".to_string() }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
