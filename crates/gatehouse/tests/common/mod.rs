//! Shared fixtures for gateway integration tests
//!
//! Fixed-answer stand-ins for the credential and route stores, a gateway
//! builder wired to them, and a loopback backend that echoes what it saw.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json, Router,
    body::Body,
    extract::Request,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use gatehouse::{GatewayServer, GatewayState, Keeper, RouteStore};
use gatehouse_auth::{CredentialStore, JwtTokenService, SessionClaims, TokenError, TokenService};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const SHARED_KEY: &str = "integration-test-key";

/// Plaintext credential store
#[derive(Default)]
pub struct FixedCredentials {
    passwords: HashMap<String, String>,
}

impl FixedCredentials {
    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.passwords
            .insert(username.to_string(), password.to_string());
        self
    }
}

impl CredentialStore for FixedCredentials {
    fn username_exists(&self, username: &str) -> bool {
        self.passwords.contains_key(username)
    }

    fn verify_password(&self, username: &str, password: &str) -> bool {
        self.passwords.get(username).is_some_and(|p| p == password)
    }
}

/// Route store with independent permission and destination tables
#[derive(Default)]
pub struct FixedRoutes {
    allowed: HashMap<String, Vec<String>>,
    destinations: HashMap<String, String>,
}

impl FixedRoutes {
    pub fn with_route(mut self, name: &str, destination: &str, users: &[&str]) -> Self {
        self.destinations
            .insert(name.to_string(), destination.to_string());
        self.allow(name, users)
    }

    /// Grant access without a destination
    pub fn allow(mut self, name: &str, users: &[&str]) -> Self {
        self.allowed.insert(
            name.to_string(),
            users.iter().map(|u| (*u).to_string()).collect(),
        );
        self
    }
}

impl RouteStore for FixedRoutes {
    fn is_user_allowed(&self, route: &str, username: &str) -> bool {
        self.allowed
            .get(route)
            .is_some_and(|users| users.iter().any(|u| u == username))
    }

    fn resolve_destination(&self, route: &str) -> Option<String> {
        self.destinations.get(route).cloned()
    }
}

/// Token service whose signing always fails
pub struct BrokenSigner;

impl TokenService for BrokenSigner {
    fn issue_token(&self, _username: &str) -> Result<String, TokenError> {
        Err(TokenError::clock("clock unavailable"))
    }

    fn validate_token(&self, _token: &str) -> Option<String> {
        None
    }
}

/// A gateway plus handles on the pieces tests inspect
pub struct TestGateway {
    pub state: GatewayState,
    pub stats: Arc<Keeper>,
    pub tokens: Arc<JwtTokenService>,
}

impl TestGateway {
    pub fn new(routes: FixedRoutes) -> Self {
        let credentials = FixedCredentials::default()
            .with_user("bob", "hunter2")
            .with_user("alice", "wonderland");
        Self::with_credentials(credentials, routes)
    }

    pub fn with_credentials(credentials: FixedCredentials, routes: FixedRoutes) -> Self {
        let stats = Arc::new(Keeper::new(["bob", "alice"]));
        let tokens = Arc::new(JwtTokenService::new(SHARED_KEY));
        let state = GatewayState::new(
            Arc::new(credentials),
            Arc::new(routes),
            tokens.clone(),
            stats.clone(),
        )
        .unwrap();

        Self {
            state,
            stats,
            tokens,
        }
    }

    pub fn router(&self) -> Router {
        GatewayServer::new("127.0.0.1:0".parse().unwrap(), self.state.clone()).router()
    }

    pub fn token_for(&self, username: &str) -> String {
        self.tokens.issue_token(username).unwrap()
    }
}

/// Correctly signed token whose expiry passed a minute ago
pub fn expired_token_for(username: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = SessionClaims {
        username: username.to_string(),
        iat: now - 660,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SHARED_KEY.as_bytes()),
    )
    .unwrap()
}

pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn request(method: &str, uri: &str, authorization: Option<&str>) -> Request {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "gate.example");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn echo(request: Request) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    (
        StatusCode::CREATED,
        [("x-backend", "echo")],
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "host": header("host"),
            "forwarded_host": header("x-forwarded-host"),
            "forwarded_for": header("x-forwarded-for"),
            "authorization": header("authorization"),
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// Start a loopback backend that answers every request with what it received
pub async fn spawn_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(echo))
            .await
            .unwrap();
    });
    addr
}

/// An address nothing is listening on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
