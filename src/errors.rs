use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error envelope returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "success": false,
    "error": true,
    "message": "Insufficient stock for Ethiopia Yirgacheffe 250g. Available: 3, Required: 5",
    "requestId": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    pub success: bool,
    pub error: bool,
    /// Human-readable error description
    pub message: String,
    /// Itemized validation failures, present for accounting-identity violations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Validation failed")]
    InvalidFields(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    TransactionFailed(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

/// Driver messages for lock waits that a retry can resolve
const CONTENTION_MARKERS: [&str; 3] = [
    "database is locked",
    "could not serialize access",
    "deadlock detected",
];

impl ServiceError {
    /// Wraps a database failure raised while a stock-deducting transaction was open.
    /// Lock contention becomes `Conflict` so the caller retries the whole
    /// transaction. Business errors pass through untouched.
    pub fn in_transaction(self) -> Self {
        match self {
            ServiceError::DatabaseError(err) => {
                let message = err.to_string();
                if CONTENTION_MARKERS.iter().any(|marker| message.contains(marker)) {
                    ServiceError::Conflict(message)
                } else {
                    ServiceError::TransactionFailed(message)
                }
            }
            other => other,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidFields(_)
            | Self::BadRequest(_)
            | Self::InsufficientStock(_)
            | Self::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::TransactionFailed(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::ExternalServiceError(_) => "Upstream service error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let errors = match &self {
            ServiceError::InvalidFields(items) => Some(items.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: true,
            message: self.response_message(),
            errors,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
