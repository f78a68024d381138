//! # Error Handling Module
//!
//! This module defines every error the router can produce, using the `thiserror` crate, and maps
//! each of them to an HTTP status code for client responses.
//!
//! ## Error Categories
//!
//! Errors fall into two very different families:
//!
//! ### Construction-time errors
//! - `Configuration` is raised while the route tree is being built (a controller that is not a
//!   struct, an unexported type name, two routes on the same verb and path, an invalid config
//!   file). These abort engine setup and are never recovered.
//!
//! ### Request-time errors
//! - `Bind` - the request could not be decoded into the declared request type
//! - `Validation` - the request decoded fine but its `Validate` implementation rejected it
//! - `Business` - the controller method itself returned an error
//! - `Unknown` - the controller method panicked; the panic is contained and replaced by this
//! - `RateLimited` / `Intercepted` - produced by the bundled middleware
//!
//! Request-time errors are handed to the `Responder`, which turns them into the response
//! envelope. None of them is retried.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;

/// Main result type used throughout the router
pub type RouterResult<T> = Result<T, RouterError>;

/// Error type for the router
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display` with the given message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    /// Controller graph or configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Request could not be bound into the declared request type
    #[error("Bind error: {message}")]
    Bind { message: String },

    /// Bound request failed its own validation
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Error returned by a controller method
    #[error("{message}")]
    Business { status: u16, message: String },

    /// A controller method misbehaved in a way its signature does not allow
    #[error("unknown error")]
    Unknown,

    /// Client exceeded its request budget
    #[error("Rate limit exceeded for {client}")]
    RateLimited { client: String },

    /// Request matched an interceptor rule
    #[error("{message}")]
    Intercepted {
        method: String,
        path: String,
        message: String,
    },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (file operations, sockets)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing and writing errors
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl RouterError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a bind error with a custom message
    pub fn bind<S: Into<String>>(message: S) -> Self {
        Self::Bind {
            message: message.into(),
        }
    }

    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a business error answered with `500 Internal Server Error`
    pub fn business<S: Into<String>>(message: S) -> Self {
        Self::Business {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message: message.into(),
        }
    }

    /// Create a business error with an explicit HTTP status
    pub fn business_with_status<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self::Business {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    /// Create a not found business error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::business_with_status(StatusCode::NOT_FOUND, message)
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Bind { .. } => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Business { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Intercepted { .. } => StatusCode::FORBIDDEN,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json { .. } => StatusCode::BAD_REQUEST,
            Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Bind { .. } => "bind_error",
            Self::Validation { .. } => "validation_error",
            Self::Business { .. } => "business_error",
            Self::Unknown => "unknown_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::Intercepted { .. } => "intercepted",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
        }
    }

    /// Whether this error was caused by the client's input
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<Infallible> for RouterError {
    fn from(infallible: Infallible) -> Self {
        match infallible {}
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for RouterError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for RouterError {
    fn from(err: anyhow::Error) -> Self {
        Self::business(err.to_string())
    }
}

/// Errors that escape the responder (for example from a raw handler using `?`) still become a
/// structured JSON body with the right status code.
impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("controller {} is not a struct", name)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::RouterError::config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(RouterError::bind("missing id").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RouterError::validation("name too short").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            RouterError::RateLimited {
                client: "10.0.0.1".to_string()
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(RouterError::Unknown.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_business_error_keeps_status_and_message() {
        let err = RouterError::business_with_status(StatusCode::CONFLICT, "already exists");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "already exists");

        let err = RouterError::Business {
            status: 42,
            message: "odd".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unknown_error_message() {
        assert_eq!(RouterError::Unknown.to_string(), "unknown error");
        assert_eq!(RouterError::Unknown.error_type(), "unknown_error");
    }

    #[test]
    fn test_client_errors() {
        assert!(RouterError::bind("bad").is_client_error());
        assert!(!RouterError::internal("boom").is_client_error());
    }

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("controller {} is not a struct", "Slice");
        assert_eq!(
            err,
            RouterError::Configuration {
                message: "controller Slice is not a struct".to_string()
            }
        );
    }
}
