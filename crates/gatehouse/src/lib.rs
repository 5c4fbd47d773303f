//! # gatehouse
//!
//! An authenticating reverse-proxy gateway. Clients trade Basic credentials
//! for a short-lived bearer token at `/session/create`, then send that token
//! with requests to `/proxy/{target}`, which the gateway forwards to the
//! backend configured for `target` if the user is on the route's allow-list.
//!
//! ## Architecture
//!
//! ```text
//! client ──► GatewayServer ──► require_bearer ──► handlers
//!                 │                  │               │
//!          CredentialStore     TokenService    RouteStore / StatsKeeper
//!                                                    │
//!                                              ProxyCache ──► backend
//! ```
//!
//! The collaborators are traits so the server can run against the JSON
//! [`config::GatewayConfig`] in production and fixed-answer doubles in tests.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gatehouse::config::GatewayConfig;
//! use gatehouse::server::{GatewayServer, GatewayState, shutdown_signal};
//! use gatehouse::stats::Keeper;
//! use gatehouse_auth::JwtTokenService;
//! use secrecy::ExposeSecret;
//!
//! # async fn run() -> gatehouse::error::GatewayResult<()> {
//! let config = Arc::new(GatewayConfig::from_file("gatehouse.json")?);
//! let stats = Arc::new(Keeper::new(config.usernames().iter().cloned()));
//! let tokens = Arc::new(JwtTokenService::new(config.shared_key().expose_secret()));
//!
//! let state = GatewayState::new(config.clone(), config, tokens, stats)?;
//! GatewayServer::new("0.0.0.0:8080".parse().unwrap(), state)
//!     .serve(shutdown_signal())
//!     .await
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod stats;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use proxy::{ProxyCache, ReverseProxy};
pub use routes::RouteStore;
pub use server::{AuthenticatedUser, GatewayServer, GatewayState};
pub use stats::{Keeper, StatsKeeper, UserStats};
