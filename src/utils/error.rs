use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Capacity exceeded: {remaining} ticket(s) remaining")]
    CapacityExceeded { remaining: i64 },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Integrity error: {0}")]
    IntegrityError(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CapacityExceeded { .. } => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::IntegrityError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::IntegrityError(_) => "INTEGRITY_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::IntegrityError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::CapacityExceeded { remaining } => {
                error!(remaining, "Ticket cap would be exceeded");
            }
            AppError::RateLimited => {
                error!("Rate limit exceeded");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level messages to the client; storage errors stay
        // generic so nothing internal leaks.
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::CapacityExceeded { remaining } => {
                format!("Only {} ticket(s) can still be issued", remaining)
            }
            AppError::RateLimited => "Too many requests. Please slow down.".to_string(),
            AppError::IntegrityError(_) | AppError::DatabaseError(_) => {
                "A storage error occurred".to_string()
            }
        };

        // Remaining capacity is the one detail callers need to retry with a
        // smaller batch.
        let details = match &self {
            AppError::CapacityExceeded { remaining } => Some(json!({ "remaining": remaining })),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AuthError("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::CapacityExceeded { remaining: 3 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn capacity_code_is_stable() {
        assert_eq!(
            AppError::CapacityExceeded { remaining: 0 }.code(),
            "CAPACITY_EXCEEDED"
        );
    }
}
