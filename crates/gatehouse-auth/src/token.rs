//! Session token issuance and validation
//!
//! Tokens are compact HS256 JWTs carrying the username plus issue and expiry
//! times in seconds since the Unix epoch:
//!
//! ```text
//! { "username": "bob", "iat": 1700000000, "exp": 1700000600 }
//! ```
//!
//! Validation is stateless. There is no session table, so a token stays
//! usable until `exp` passes and cannot be revoked earlier. Every reason a
//! token can be rejected (bad signature, wrong algorithm, malformed payload,
//! expiry) collapses into the same `None` for callers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TokenError, TokenResult};

/// Lifetime of a freshly issued token
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Issues and validates bearer tokens
pub trait TokenService: Send + Sync {
    /// Issue a token for `username`, valid from now for the service TTL
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if the clock is unusable or signing fails.
    fn issue_token(&self, username: &str) -> TokenResult<String>;

    /// Return the token's username if the token is currently valid
    ///
    /// Never fails: malformed, forged and expired tokens all yield `None`.
    fn validate_token(&self, token: &str) -> Option<String>;
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject of the session
    pub username: String,
    /// Issued at (seconds since epoch)
    pub iat: u64,
    /// Expires at (seconds since epoch)
    pub exp: u64,
}

/// HS256 token service keyed by a pre-shared secret
#[derive(Clone)]
pub struct JwtTokenService {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for JwtTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenService")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwtTokenService {
    /// Create a token service signing with `secret`
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Set the lifetime of issued tokens
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lifetime of issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn current_timestamp() -> TokenResult<u64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TokenError::clock(e.to_string()))
            .map(|d| d.as_secs())
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    fn decode_claims(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        decode::<SessionClaims>(token, &key, &Self::validation()).map(|data| data.claims)
    }
}

impl TokenService for JwtTokenService {
    fn issue_token(&self, username: &str) -> TokenResult<String> {
        let now = Self::current_timestamp()?;
        let ttl_secs = self.ttl.as_secs();
        let exp = now
            .checked_add(ttl_secs)
            .ok_or(TokenError::Lifetime { ttl_secs })?;
        let claims = SessionClaims {
            username: username.to_string(),
            iat: now,
            exp,
        };

        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }

    fn validate_token(&self, token: &str) -> Option<String> {
        match self.decode_claims(token) {
            Ok(claims) => Some(claims.username),
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}
