//! Error types for the library server

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes returned alongside every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NotFound = 5,
    NotAvailable = 6,
    AlreadyBorrowed = 7,
    MaxLoansReached = 8,
    TransactionConflict = 9,
    BadValue = 10,
    Duplicate = 11,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Already borrowed: {0}")]
    AlreadyBorrowed(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the caller may simply retry the request
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransactionConflict(_))
    }
}

/// Postgres SQLSTATEs that mean "lost a race, try again":
/// serialization_failure, deadlock_detected, lock_not_available.
const RETRYABLE_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Application error for a SQLSTATE, `None` when it stays a database error
fn from_sqlstate(code: &str) -> Option<AppError> {
    match code {
        c if RETRYABLE_SQLSTATES.contains(&c) => {
            tracing::warn!(sqlstate = c, "Transaction aborted by contention");
            Some(AppError::TransactionConflict("Concurrent update, please retry".to_string()))
        }
        UNIQUE_VIOLATION => Some(AppError::Conflict("Duplicate record".to_string())),
        FOREIGN_KEY_VIOLATION => Some(AppError::Conflict("Record is still referenced".to_string())),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::PoolTimedOut = err {
            return AppError::TransactionConflict("Timed out waiting for a database connection".to_string());
        }

        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());

        code.as_deref()
            .and_then(from_sqlstate)
            .unwrap_or_else(|| AppError::Database(err))
    }
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

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();

        let (status, code, message) = match self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg),
            AppError::Unavailable(msg) => (StatusCode::CONFLICT, ErrorCode::NotAvailable, msg),
            AppError::AlreadyBorrowed(msg) => (StatusCode::CONFLICT, ErrorCode::AlreadyBorrowed, msg),
            AppError::LimitExceeded(msg) => (StatusCode::CONFLICT, ErrorCode::MaxLoansReached, msg),
            AppError::TransactionConflict(msg) => {
                tracing::warn!("Transaction conflict: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::TransactionConflict, msg)
            }
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        if retryable {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Unavailable("x".into()), StatusCode::CONFLICT),
            (AppError::LimitExceeded("x".into()), StatusCode::CONFLICT),
            (AppError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_conflict_sets_retry_after() {
        let response = AppError::TransactionConflict("busy".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn test_sqlstate_mapping() {
        assert!(matches!(from_sqlstate("40001"), Some(AppError::TransactionConflict(_))));
        assert!(matches!(from_sqlstate("55P03"), Some(AppError::TransactionConflict(_))));
        assert!(matches!(from_sqlstate("23505"), Some(AppError::Conflict(_))));
        assert!(matches!(from_sqlstate("23503"), Some(AppError::Conflict(_))));
        assert!(from_sqlstate("23514").is_none());
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
    }
}
