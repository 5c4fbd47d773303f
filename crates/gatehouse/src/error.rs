//! Error types for the gateway
//!
//! Three families, mirroring how the gateway answers clients:
//! - Client input: missing or malformed credentials, unknown user, bad password, bad token (4xx)
//! - Authorization: route not permitted or unknown (403/404)
//! - Internal: signing failure, unparsable backend URL, backend unreachable (5xx, logged)
//!
//! Startup errors (configuration, binding the listener) share the same type so
//! the binary has one error to report.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// No usable credentials were presented
    ///
    /// `challenge` is sent back as the `WWW-Authenticate` header value.
    #[error("Not authenticated: {message}")]
    Unauthenticated {
        /// Error message
        message: String,
        /// `WWW-Authenticate` value
        challenge: &'static str,
    },

    /// Caller is authenticated but not permitted
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Error message
        message: String,
    },

    /// Named user or route does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Error message
        message: String,
    },

    /// Request body could not be read from the client
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message
        message: String,
    },

    /// Request body exceeded the forwarding limit
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Token could not be issued
    #[error("Token error: {0}")]
    Token(#[from] gatehouse_auth::TokenError),

    /// Backend did not answer
    #[error("Backend error: {message}")]
    Backend {
        /// Error message
        message: String,
        /// Destination URL, if known
        destination: Option<String>,
    },

    /// Invalid configuration (missing fields, bad values, unparsable URLs)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
        /// Configuration key or path that caused the error
        key: Option<String>,
    },

    /// Internal invariant broken while handling a request
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// `WWW-Authenticate` challenge for session creation
pub const BASIC_CHALLENGE: &str = r#"Basic realm="Restricted""#;

/// `WWW-Authenticate` challenge for bearer-protected routes
pub const BEARER_CHALLENGE: &str = "Bearer";

impl GatewayError {
    /// Missing or malformed Basic credentials
    pub fn basic_required(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
            challenge: BASIC_CHALLENGE,
        }
    }

    /// Missing, malformed or rejected bearer token
    pub fn bearer_required(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
            challenge: BEARER_CHALLENGE,
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a bad-request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a backend error naming the destination
    pub fn backend_with_destination(
        message: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            destination: Some(destination.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error with key context
    pub fn configuration_with_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Token(_)
            | Self::Configuration { .. }
            | Self::Internal { .. }
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for response bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::BadRequest { .. } => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Backend { .. } => "bad_gateway",
            _ => "internal_error",
        }
    }

    /// Sanitize error message for client responses
    ///
    /// Client errors keep their message; internal errors are reduced to a
    /// fixed phrase so configuration and backend details stay in the logs.
    pub fn sanitize(&self) -> String {
        match self {
            Self::Unauthenticated { message, .. }
            | Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::BadRequest { message } => message.clone(),
            Self::PayloadTooLarge { limit } => format!("Request body exceeds {limit} bytes"),
            Self::Backend { .. } => "Backend unavailable".to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

/// Extension trait for Result types to add gateway error context
pub trait GatewayErrorExt<T> {
    /// Add configuration context to error
    fn config_context(self, context: impl Into<String>) -> GatewayResult<T>;
}

impl<T, E> GatewayErrorExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn config_context(self, context: impl Into<String>) -> GatewayResult<T> {
        self.map_err(|e| GatewayError::configuration_with_key(e.to_string(), context.into()))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = json!({
            "error": self.code(),
            "error_description": self.sanitize(),
        });
        let mut resp = (status, axum::Json(body)).into_response();

        if let Self::Unauthenticated { challenge, .. } = self {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(challenge),
            );
        }

        resp
    }
}
