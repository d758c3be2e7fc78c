//! HTTP error handling and conversion.
//!
//! Internal errors are translated to status codes here; nothing beyond the
//! error code and message leaks to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arguslm_domain::DomainError;

/// API-facing error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Destructive operation violates an invariant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Downstream dependency failed
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Unexpected internal failure
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API response
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Standardized error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable message
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.error_code().to_string(),
            detail: match &self {
                // Internal detail stays in the logs
                Self::Internal(detail) => {
                    tracing::error!(%detail, "internal server error");
                    "Internal server error".to_string()
                }
                other => other.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<arguslm_infrastructure::Error> for ApiError {
    fn from(err: arguslm_infrastructure::Error) -> Self {
        use arguslm_infrastructure::Error as E;
        match err {
            E::NotFound(what) => Self::NotFound(what),
            E::Configuration(msg) => Self::BadRequest(msg),
            E::Serialization(err) => Self::BadRequest(err.to_string()),
            E::Database(err) => Self::ServiceUnavailable(err.to_string()),
            E::CorruptRow(msg) => Self::Internal(msg),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err.http_status() {
            404 => Self::NotFound(err.to_string()),
            409 => Self::Conflict(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::ServiceUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_detail_is_not_leaked() {
        let response = ApiError::Internal("secret stack trace".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_domain_error_mapping() {
        let err = DomainError::Conflict("has history".into());
        assert_eq!(ApiError::from(err).status_code(), StatusCode::CONFLICT);

        let err = DomainError::NotFound {
            entity: "Model",
            id: "x".into(),
        };
        assert_eq!(ApiError::from(err).status_code(), StatusCode::NOT_FOUND);
    }
}
