//! Endpoint handlers
//!
//! | Method | Path                    | Auth   |
//! |--------|-------------------------|--------|
//! | GET    | `/session/create`       | Basic  |
//! | GET    | `/session/{user}/stats` | Bearer |
//! | ANY    | `/proxy/{target}`       | Bearer |

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Request, State},
    http::{HeaderMap, header},
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{AuthenticatedUser, GatewayState};
use crate::error::{GatewayError, GatewayResult};
use crate::stats::UserStats;

/// Body of a successful session creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Signed bearer token
    pub token: String,
}

/// Username and password from an `Authorization: Basic` header
///
/// The scheme is matched case-insensitively and the decoded pair is split at
/// the first `:`, so passwords may contain colons.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_at_checked(6)?;
    if !scheme.eq_ignore_ascii_case("basic ") {
        return None;
    }

    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// `GET /session/create`
///
/// Exchanges Basic credentials for a bearer token. Known users have the
/// outcome recorded in their stats; unknown users and missing credentials
/// leave stats untouched.
pub async fn create_session(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> GatewayResult<Json<SessionToken>> {
    let Some((username, password)) = basic_credentials(&headers) else {
        return Err(GatewayError::basic_required("Basic credentials required"));
    };

    if !state.credentials.username_exists(&username) {
        return Err(GatewayError::not_found("Username not found"));
    }

    let credentials = Arc::clone(&state.credentials);
    let candidate = username.clone();
    let verified =
        tokio::task::spawn_blocking(move || credentials.verify_password(&candidate, &password))
            .await
            .map_err(|e| GatewayError::internal(format!("Password verification aborted: {e}")))?;

    if !verified {
        state.stats.increment_unauthorized(&username);
        info!(username = %username, "Session refused: bad password");
        return Err(GatewayError::forbidden("Invalid password"));
    }

    let token = state.tokens.issue_token(&username)?;
    state.stats.increment_authorized(&username);
    info!(username = %username, "Session created");

    Ok(Json(SessionToken { token }))
}

/// `GET /session/{user}/stats`
///
/// Callers may only read their own record.
pub async fn session_stats(
    State(state): State<GatewayState>,
    Path(user): Path<String>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> GatewayResult<Json<UserStats>> {
    if user != caller.username() {
        debug!(caller = %caller.username(), requested = %user, "Stats request for another user");
        return Err(GatewayError::forbidden("Stats are only available to their owner"));
    }

    state
        .stats
        .snapshot(&user)
        .map(Json)
        .ok_or_else(|| GatewayError::internal(format!("No stats record for '{user}'")))
}

/// `ANY /proxy/{target}`
///
/// Forwards the request to the route's destination. The permission check
/// runs before resolution, so unknown routes answer 403 to callers on no
/// allow-list.
pub async fn proxy_request(
    State(state): State<GatewayState>,
    Path(target): Path<String>,
    Extension(caller): Extension<AuthenticatedUser>,
    request: Request,
) -> GatewayResult<Response> {
    if !state.routes.is_user_allowed(&target, caller.username()) {
        return Err(GatewayError::forbidden(format!(
            "Route '{target}' is not permitted"
        )));
    }

    let destination = state
        .routes
        .resolve_destination(&target)
        .ok_or_else(|| GatewayError::not_found(format!("Unknown route '{target}'")))?;

    let url = Url::parse(&destination).map_err(|e| {
        GatewayError::configuration_with_key(
            format!("Invalid destination '{destination}': {e}"),
            target.clone(),
        )
    })?;

    debug!(
        username = %caller.username(),
        route = %target,
        destination = %url,
        "Proxying request"
    );

    let proxy = state.proxies.get_or_create(&url);
    proxy.forward(request, state.body_limit).await
}
