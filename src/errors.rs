use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JSON body rendered for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Core error taxonomy returned by the service layer.
///
/// Services propagate precise causes; the API edge decides what the client
/// is allowed to see (see [`ApiError`]).
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

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatus(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Edge error type produced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,
}

impl ApiError {
    /// Status and user-facing message per error kind. Database and other
    /// internal causes are deliberately collapsed into a generic message;
    /// the precise cause is logged where the error is converted.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                ServiceError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ServiceError::InvalidOperation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ServiceError::InsufficientStock(name) => (
                    StatusCode::BAD_REQUEST,
                    format!("Insufficient stock for '{}'", name),
                ),
                ServiceError::EmptyCart => {
                    (StatusCode::BAD_REQUEST, "Cart is empty".to_string())
                }
                ServiceError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
                ServiceError::InvalidStatus(msg) => (StatusCode::CONFLICT, msg.clone()),
                ServiceError::DatabaseError(_) | ServiceError::InternalError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                ),
            },
            ApiError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Service(
            err @ (ServiceError::DatabaseError(_) | ServiceError::InternalError(_)),
        ) = &self
        {
            tracing::error!(error = %err, "request failed with internal error");
        }

        let (status, message) = self.status_and_message();
        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
