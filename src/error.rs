//! Error types for Bookrent server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchData = 4,
    BadValue = 5,
    Duplicate = 6,
    AccountBlocked = 7,
    NotAMember = 8,
    FineAlreadyPaid = 9,
    BookNotAvailable = 10,
    BusinessRule = 11,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Account blocked: {0}")]
    AccountBlocked(String),

    #[error("Membership required: {0}")]
    MembershipRequired(String),

    #[error("Fine already paid: {0}")]
    FineAlreadyPaid(String),

    #[error("Book unavailable: {0}")]
    BookUnavailable(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::BusinessRule(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::BusinessRule)
            }
            AppError::AccountBlocked(_) => (StatusCode::FORBIDDEN, ErrorCode::AccountBlocked),
            AppError::MembershipRequired(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAMember),
            AppError::FineAlreadyPaid(_) => (StatusCode::CONFLICT, ErrorCode::FineAlreadyPaid),
            AppError::BookUnavailable(_) => (StatusCode::CONFLICT, ErrorCode::BookNotAvailable),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::BusinessRule(msg)
            | AppError::AccountBlocked(msg)
            | AppError::MembershipRequired(msg)
            | AppError::FineAlreadyPaid(msg)
            | AppError::BookUnavailable(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (AppError::NotFound("Transaction not found".into()), StatusCode::NOT_FOUND),
            (AppError::AccountBlocked("blocked".into()), StatusCode::FORBIDDEN),
            (AppError::MembershipRequired("join first".into()), StatusCode::FORBIDDEN),
            (AppError::FineAlreadyPaid("paid".into()), StatusCode::CONFLICT),
            (AppError::BookUnavailable("none left".into()), StatusCode::CONFLICT),
            (AppError::BusinessRule("nope".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::AccountBlocked(String::new()).status_and_code().1,
            ErrorCode::AccountBlocked
        );
        assert_eq!(ErrorCode::FineAlreadyPaid as u32, 9);
    }
}
