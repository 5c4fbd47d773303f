//! Bearer-token gate for protected routes
//!
//! Every request reaching the stats and proxy handlers has passed through
//! [`require_bearer`], which resolves the token subject and stores it in the
//! request extensions as an [`AuthenticatedUser`]. Handlers read it with
//! `Extension<AuthenticatedUser>` and never look at the token themselves.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::trace;

use super::GatewayState;
use crate::error::{GatewayError, GatewayResult};

/// Subject of a validated bearer token, scoped to one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(String);

impl AuthenticatedUser {
    /// Wrap a validated username
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    /// Username the token was issued to
    pub fn username(&self) -> &str {
        &self.0
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
///
/// The header must hold exactly two whitespace-separated fields and the
/// scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut fields = value.split_whitespace();
    let scheme = fields.next()?;
    let token = fields.next()?;

    if fields.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

/// Reject requests without a currently valid bearer token
///
/// On success the token subject is inserted as an [`AuthenticatedUser`]
/// before the wrapped handler runs; on failure the handler is never called.
pub async fn require_bearer(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> GatewayResult<Response> {
    let Some(token) = bearer_token(request.headers()) else {
        return Err(GatewayError::bearer_required("Valid bearer token required"));
    };

    let Some(username) = state.tokens.validate_token(token) else {
        return Err(GatewayError::bearer_required("Invalid or expired token"));
    };

    trace!(username = %username, path = %request.uri().path(), "Bearer token accepted");
    request
        .extensions_mut()
        .insert(AuthenticatedUser::new(username));

    Ok(next.run(request).await)
}
