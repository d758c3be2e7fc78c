//! Error types for the ArgusLM domain.
//!
//! Domain errors carry enough structure for the HTTP layer to map each kind
//! to a status code and a stable machine-readable error code without
//! inspecting message text.

use thiserror::Error;

/// Top-level domain error type
#[derive(Debug, Error)]
pub enum DomainError {
    /// A field or cross-field validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity lookup by id came back empty
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A destructive operation would violate an invariant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Benchmark run status transition not allowed
    #[error("Invalid run status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Prompt pack id outside the built-in catalog
    #[error("Unknown prompt pack: {0}")]
    UnknownPromptPack(String),

    /// Provider kind tag outside the closed set
    #[error("Unknown provider kind: {0}")]
    UnknownProviderKind(String),
}

impl DomainError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::UnknownPromptPack(_) => "UNKNOWN_PROMPT_PACK",
            Self::UnknownProviderKind(_) => "UNKNOWN_PROVIDER_KIND",
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            _ => 400,
        }
    }
}

/// Domain-wide result type
pub type DomainResult<T> = Result<T, DomainError>;
