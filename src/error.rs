use crate::middleware::error_handling;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self.clone())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("internal server error")]
    Internal,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("message already deleted")]
    AlreadyDeleted,
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Cache(e.to_string())
    }
}

// NOTE: No need to implement From<AppError> for actix_web::Error
// because actix-web provides a blanket impl for all ResponseError types:
// impl<T: ResponseError + 'static> From<T> for actix_web::Error

impl AppError {
    /// Returns whether this error is retryable (e.g., database connection timeout)
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(msg) => {
                msg.contains("Timeout") || msg.contains("Closed") || msg.contains("Io")
            }
            AppError::Cache(_) | AppError::Internal => true,
            _ => false,
        }
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::AlreadyDeleted => 410, // 410 Gone
            AppError::ServiceUnavailable(_) => 503,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal => 500,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Unauthorized.status_code(), 401);
        assert_eq!(AppError::Forbidden.status_code(), 403);
        assert_eq!(AppError::NotFound.status_code(), 404);
        assert_eq!(AppError::AlreadyDeleted.status_code(), 410);
        assert_eq!(AppError::Database("x".into()).status_code(), 500);
        assert_eq!(AppError::ServiceUnavailable("x".into()).status_code(), 503);
    }

    #[test]
    fn test_forbidden_distinct_from_not_found() {
        // Authorization failures and missing resources must map to
        // different statuses so clients can distinguish them.
        assert_ne!(
            AppError::Forbidden.status_code(),
            AppError::NotFound.status_code()
        );
    }

    #[test]
    fn test_retryability() {
        assert!(AppError::Database("connection Timeout".into()).is_retryable());
        assert!(AppError::Cache("broken pipe".into()).is_retryable());
        assert!(!AppError::Forbidden.is_retryable());
        assert!(!AppError::BadRequest("x".into()).is_retryable());
    }
}
