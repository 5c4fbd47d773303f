//! Error types for token issuance

use thiserror::Error;

/// Result type for token operations
pub type TokenResult<T> = std::result::Result<T, TokenError>;

/// Failure to produce a signed token
///
/// Validation never produces one of these: a token that cannot be
/// validated is simply rejected (see [`crate::TokenService::validate_token`]).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TokenError {
    /// The system clock reads earlier than the Unix epoch
    #[error("System time error: {0}")]
    Clock(String),

    /// The configured lifetime pushes `exp` past the representable range
    #[error("Token lifetime of {ttl_secs}s overflows the expiry timestamp")]
    Lifetime {
        /// Configured lifetime in seconds
        ttl_secs: u64,
    },

    /// The JWT library refused to sign the claims
    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Create a clock error
    pub fn clock(message: impl Into<String>) -> Self {
        Self::Clock(message.into())
    }
}
