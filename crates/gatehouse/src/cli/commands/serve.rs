//! Serve command implementation
//!
//! Loads the configuration file, builds the stats keeper and token service,
//! and runs the gateway until Ctrl+C or SIGTERM.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use gatehouse_auth::{DEFAULT_TOKEN_TTL, JwtTokenService};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::proxy::DEFAULT_BODY_LIMIT;
use crate::server::{GatewayServer, GatewayState, shutdown_signal};
use crate::stats::Keeper;

/// Longest token lifetime accepted on the command line (one week)
pub const MAX_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Run the gateway
///
/// # Examples
///
/// Listen on all interfaces, port 8080:
///   GATEHOUSE_PORT=8080 GATEHOUSE_CONFIG=/etc/gatehouse.json gatehouse serve
///
/// Listen on loopback only:
///   gatehouse serve --config gatehouse.json --bind 127.0.0.1:8080
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "GATEHOUSE_CONFIG", value_name = "FILE")]
    pub config: PathBuf,

    /// Port to listen on, on all interfaces
    #[arg(short, long, env = "GATEHOUSE_PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Full listen address; takes precedence over --port
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Lifetime of issued tokens, in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_TOKEN_TTL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS)
    )]
    pub token_ttl: u64,

    /// Largest request body forwarded to a backend, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BODY_LIMIT)]
    pub max_body_bytes: usize,
}

impl ServeCommand {
    /// Execute the serve command
    pub async fn execute(self) -> GatewayResult<()> {
        let address = self.listen_address()?;

        let config = Arc::new(GatewayConfig::from_file(&self.config)?);
        config.log_summary();

        let stats = Arc::new(Keeper::new(config.usernames().iter().cloned()));
        let tokens = Arc::new(
            JwtTokenService::new(config.shared_key().expose_secret())
                .with_ttl(Duration::from_secs(self.token_ttl)),
        );

        let state = GatewayState::new(config.clone(), config, tokens, stats)?
            .with_body_limit(self.max_body_bytes);

        info!(
            address = %address,
            token_ttl_secs = self.token_ttl,
            max_body_bytes = self.max_body_bytes,
            "Starting gateway"
        );

        GatewayServer::new(address, state)
            .serve(shutdown_signal())
            .await
    }

    /// Address to bind, from --bind or the port on all interfaces
    fn listen_address(&self) -> GatewayResult<SocketAddr> {
        match (self.bind, self.port) {
            (Some(bind), _) => Ok(bind),
            (None, Some(port)) => Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))),
            (None, None) => Err(GatewayError::configuration_with_key(
                "no listen port given; set GATEHOUSE_PORT or pass --port or --bind",
                "GATEHOUSE_PORT",
            )),
        }
    }
}
