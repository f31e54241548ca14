//! Error types for RPC operations
//!
//! Every failure in the layer is expressed as an [`RpcError`] carrying a
//! type-safe [`RpcErrorCode`]. Codes serialize as SCREAMING_SNAKE_CASE strings
//! and map onto HTTP statuses at the transport boundary.
//!
//! # Example
//! ```rust,ignore
//! use djavacoal_rpc::{RpcError, RpcErrorCode};
//!
//! let error = RpcError::new(RpcErrorCode::NotFound, "Admin not found");
//! let error = RpcError::not_found("Admin not found"); // Convenience method
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Type-safe error codes for RPC operations.
///
/// Codes categorize errors into client errors (HTTP 4xx equivalent), server
/// errors (HTTP 5xx equivalent), and RPC-specific outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorCode {
    // Client errors (4xx equivalent)
    /// The request was malformed or invalid
    BadRequest,
    /// Authentication is required
    Unauthorized,
    /// The authenticated caller lacks permission
    Forbidden,
    /// The requested resource was not found
    NotFound,
    /// Input validation failed
    ValidationError,
    /// The request conflicts with current state
    Conflict,
    /// The request payload exceeds size limits
    PayloadTooLarge,

    // Server errors (5xx equivalent)
    /// An unexpected internal error occurred
    InternalError,
    /// The service is temporarily unavailable
    ServiceUnavailable,

    // RPC-specific errors
    /// The requested procedure was not found
    ProcedureNotFound,
    /// A context step could not produce its contribution
    ContextError,
    /// A value could not cross the JSON wire boundary
    SerializationError,
}

impl RpcErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::ProcedureNotFound => "PROCEDURE_NOT_FOUND",
            Self::ContextError => "CONTEXT_ERROR",
            Self::SerializationError => "SERIALIZATION_ERROR",
        }
    }

    /// Returns true if this is a client error (4xx equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::Unauthorized
                | Self::Forbidden
                | Self::NotFound
                | Self::ValidationError
                | Self::Conflict
                | Self::PayloadTooLarge
                | Self::ProcedureNotFound
                | Self::SerializationError
        )
    }

    /// Returns true if this is a server error (5xx equivalent).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::InternalError | Self::ServiceUnavailable | Self::ContextError
        )
    }

    /// HTTP status code this error maps to at the transport boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound | Self::ProcedureNotFound => 404,
            Self::ValidationError => 422,
            Self::Conflict => 409,
            Self::PayloadTooLarge => 413,
            Self::SerializationError => 400,
            Self::InternalError | Self::ContextError => 500,
            Self::ServiceUnavailable => 503,
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RPC error with type-safe code and message.
///
/// # Example
/// ```rust,ignore
/// let error = RpcError::validation("Validation failed")
///     .with_details(serde_json::json!({"field": "email"}));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("[{code}] {message}")]
pub struct RpcError {
    /// Type-safe error code
    pub code: RpcErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (JSON value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Optional cause for debugging (not exposed to clients in production)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl RpcError {
    /// Create a new error with code and message.
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Add a cause string for debugging.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Sanitize the error for the client response.
    ///
    /// Server-side failure messages may name internal steps or collaborators,
    /// so internal and context errors are replaced with a generic message
    /// before they leave the process.
    pub fn sanitize(mut self) -> Self {
        if matches!(
            self.code,
            RpcErrorCode::InternalError | RpcErrorCode::ContextError
        ) {
            self.message = "An internal error occurred".to_string();
            self.details = None;
            self.cause = None;
        }
        self
    }

    /// HTTP status code this error maps to.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    // Convenience constructors

    /// Create a NOT_FOUND error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::NotFound, message)
    }

    /// Create a BAD_REQUEST error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::BadRequest, message)
    }

    /// Create a VALIDATION_ERROR error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ValidationError, message)
    }

    /// Create an UNAUTHORIZED error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Unauthorized, message)
    }

    /// Create a FORBIDDEN error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Forbidden, message)
    }

    /// Create an INTERNAL_ERROR error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }

    /// Create a CONFLICT error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Conflict, message)
    }

    /// Create a PROCEDURE_NOT_FOUND error.
    pub fn procedure_not_found(path: &str) -> Self {
        Self::new(
            RpcErrorCode::ProcedureNotFound,
            format!("Procedure '{}' not found", path),
        )
    }

    /// Create a PAYLOAD_TOO_LARGE error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::PayloadTooLarge, message)
    }

    /// Create a SERIALIZATION_ERROR error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::SerializationError, message)
    }

    /// Create a CONTEXT_ERROR error.
    pub fn context(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ContextError, message)
    }

    /// Create a SERVICE_UNAVAILABLE error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ServiceUnavailable, message)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {}", err))
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
