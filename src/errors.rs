use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional detail, when safe to expose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Checkout session already exists")]
    SessionAlreadyOpen,

    #[error("Order is already paid")]
    AlreadySettled,

    #[error("No open checkout session")]
    NoOpenSession,

    #[error("Checkout session is expired")]
    SessionExpired,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::EmptyCart
            | Self::SessionAlreadyOpen
            | Self::AlreadySettled
            | Self::NoOpenSession
            | Self::SessionExpired
            | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal failures collapse to a
    /// generic body so implementation details never leak to callers.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_conflict_family() {
        assert_eq!(
            ServiceError::SessionAlreadyOpen.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::AlreadySettled.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::SessionExpired.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ServiceError::InternalError("connection pool exhausted".into());
        assert_eq!(err.response_message(), "Internal server error");

        let err = ServiceError::DatabaseError(sea_orm::error::DbErr::Custom(
            "secret dsn in message".into(),
        ));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn ownership_failures_surface_as_not_found() {
        let err = ServiceError::NotFound("Order 42 not found".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
