use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_postgres;

/// Service-level error type shared across the workspace.
///
/// Every crate that talks to the outside world maps its internal failures
/// onto this enum, which in turn knows how to render itself as an HTTP
/// response envelope.
///
/// ```ignore
/// match db_operation().await {
///     Ok(result) => Ok(result),
///     Err(e) => Err(ServiceError::Database(e.to_string())),
/// }
/// ```
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Timeout")]
    Timeout,
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Unauthorized => 401,
            ServiceError::Forbidden => 403,
            ServiceError::ValidationError(_) => 400,
            ServiceError::BadRequest(_) => 400,
            ServiceError::Conflict(_) => 409,
            ServiceError::ServiceUnavailable => 503,
            ServiceError::Timeout => 408,
            ServiceError::Database(_) | ServiceError::InternalError(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden => "FORBIDDEN",
            ServiceError::ValidationError(_) => "VALIDATION_ERROR",
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ServiceError::Timeout => "TIMEOUT",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "DatabaseError",
            ServiceError::NotFound(_) => "NotFoundError",
            ServiceError::Unauthorized => "UnauthorizedError",
            ServiceError::Forbidden => "ForbiddenError",
            ServiceError::ValidationError(_) => "ValidationError",
            ServiceError::BadRequest(_) => "BadRequestError",
            ServiceError::Conflict(_) => "ConflictError",
            ServiceError::ServiceUnavailable => "ServiceUnavailableError",
            ServiceError::Timeout => "TimeoutError",
            ServiceError::InternalError(_) => "InternalError",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            status: self.status_code(),
            error_type: self.error_type().to_string(),
            code: self.error_code().to_string(),
            details: None,
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<tokio_postgres::Error> for ServiceError {
    fn from(err: tokio_postgres::Error) -> Self {
        // tokio-postgres doesn't distinguish RowNotFound; treat all as database errors
        ServiceError::Database(err.to_string())
    }
}

/// Uniform API error response envelope used by every HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error name (matches `error_type` for legacy clients)
    pub error: String,

    /// Human-readable message
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error class the client can route on (e.g. "NotFoundError")
    pub error_type: String,

    /// Stable machine code, format SERVICE_CODE (e.g. "ROOM_NOT_FOUND")
    pub code: String,

    /// Extra detail, only populated in development builds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Request trace id for log correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            details: None,
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// Stable error codes, grouped by concern.
pub mod error_codes {
    // Authentication
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";

    // Rooms
    pub const ROOM_NOT_FOUND: &str = "ROOM_NOT_FOUND";
    pub const ROOM_DELETED: &str = "ROOM_DELETED";
    pub const NOT_ROOM_MEMBER: &str = "NOT_ROOM_MEMBER";
    pub const NOT_ROOM_ADMIN: &str = "NOT_ROOM_ADMIN";
    pub const DIRECT_ROOM_IMMUTABLE: &str = "DIRECT_ROOM_IMMUTABLE";
    pub const MEMBER_NOT_FOUND: &str = "MEMBER_NOT_FOUND";
    pub const CANNOT_REMOVE_OWNER: &str = "CANNOT_REMOVE_OWNER";

    // Messages
    pub const MESSAGE_NOT_FOUND: &str = "MESSAGE_NOT_FOUND";
    pub const MESSAGE_DELETED: &str = "MESSAGE_DELETED";
    pub const NOT_MESSAGE_SENDER: &str = "NOT_MESSAGE_SENDER";
    pub const EMPTY_MESSAGE: &str = "EMPTY_MESSAGE";

    // Presence
    pub const PRESENCE_NOT_FOUND: &str = "PRESENCE_NOT_FOUND";
    pub const INVALID_PRESENCE_STATUS: &str = "INVALID_PRESENCE_STATUS";

    // Database/System
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const CACHE_ERROR: &str = "CACHE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

/// Error classes clients route on.
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_creation() {
        let error = ErrorResponse::new(
            "NotFoundError",
            "room does not exist",
            404,
            "NotFoundError",
            error_codes::ROOM_NOT_FOUND,
        );

        assert_eq!(error.status, 404);
        assert_eq!(error.code, "ROOM_NOT_FOUND");
        assert!(error.details.is_none());
        assert!(error.trace_id.is_none());
    }

    #[test]
    fn test_error_response_builders() {
        let error = ErrorResponse::new("ForbiddenError", "nope", 403, "ForbiddenError", "FORBIDDEN")
            .with_details("user is not an admin of this room".to_string())
            .with_trace_id("req-123".to_string());

        assert_eq!(error.details.as_deref(), Some("user is not an admin of this room"));
        assert_eq!(error.trace_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn test_service_error_status_codes() {
        assert_eq!(ServiceError::NotFound("room".into()).status_code(), 404);
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
        assert_eq!(ServiceError::Forbidden.status_code(), 403);
        assert_eq!(ServiceError::Conflict("seq".into()).status_code(), 409);
        assert_eq!(ServiceError::Database("boom".into()).status_code(), 500);
        assert_eq!(ServiceError::ServiceUnavailable.status_code(), 503);
    }

    #[test]
    fn test_service_error_to_response_round_trip() {
        let response = ServiceError::Forbidden.to_response();
        let json = serde_json::to_string(&response).unwrap();
        let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.status, 403);
        assert_eq!(parsed.error_type, "ForbiddenError");
        assert_eq!(parsed.code, "FORBIDDEN");
    }
}
