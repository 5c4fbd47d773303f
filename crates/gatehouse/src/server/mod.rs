//! HTTP gateway server
//!
//! ```text
//! GET /session/create ───────────────────────────► create_session
//! GET /session/{user}/stats ──► require_bearer ──► session_stats
//! ANY /proxy/{target} ────────► require_bearer ──► proxy_request ──► ProxyCache ──► backend
//! ```
//!
//! Collaborators are held behind `Arc<dyn Trait>` in [`GatewayState`], which
//! axum clones into every request task.

pub mod handlers;
pub mod middleware;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{any, get},
};
use gatehouse_auth::{CredentialStore, TokenService};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handlers::SessionToken;
pub use middleware::{AuthenticatedUser, require_bearer};

use crate::error::{GatewayError, GatewayResult};
use crate::proxy::{DEFAULT_BODY_LIMIT, ProxyCache, build_client};
use crate::routes::RouteStore;
use crate::stats::StatsKeeper;

/// Shared state for all request handlers
#[derive(Clone)]
pub struct GatewayState {
    /// Username and password checks for session creation
    pub credentials: Arc<dyn CredentialStore>,
    /// Route permissions and destinations
    pub routes: Arc<dyn RouteStore>,
    /// Token issuance and validation
    pub tokens: Arc<dyn TokenService>,
    /// Login statistics
    pub stats: Arc<dyn StatsKeeper>,
    /// Forwarding handles by destination
    pub proxies: Arc<ProxyCache>,
    /// Largest request body forwarded to a backend
    pub body_limit: usize,
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("proxies", &self.proxies.len())
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl GatewayState {
    /// Assemble gateway state with an empty proxy cache
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the backend HTTP client
    /// cannot be built.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        routes: Arc<dyn RouteStore>,
        tokens: Arc<dyn TokenService>,
        stats: Arc<dyn StatsKeeper>,
    ) -> GatewayResult<Self> {
        Ok(Self {
            credentials,
            routes,
            tokens,
            stats,
            proxies: Arc::new(ProxyCache::new(build_client()?)),
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    /// Set the largest request body forwarded to a backend
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

/// The gateway's HTTP front end
#[derive(Debug)]
pub struct GatewayServer {
    address: SocketAddr,
    state: GatewayState,
}

impl GatewayServer {
    /// Create a server that will listen on `address`
    pub fn new(address: SocketAddr, state: GatewayState) -> Self {
        Self { address, state }
    }

    /// Address the server binds to
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Build the router with all endpoints and middleware
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route("/session/{user}/stats", get(handlers::session_stats))
            .route("/proxy/{target}", any(handlers::proxy_request))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                require_bearer,
            ));

        Router::new()
            .route("/session/create", get(handlers::create_session))
            .merge(protected)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the address cannot be bound
    /// and [`GatewayError::Io`] if the server fails while running.
    pub async fn serve<F>(self, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.address).await.map_err(|e| {
            GatewayError::configuration_with_key(
                format!("Failed to bind to {}: {e}", self.address),
                "bind",
            )
        })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] if the server fails while running.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        info!(address = %listener.local_addr()?, "Gateway listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Gateway stopped");

        Ok(())
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
