//! Command-line interface for the gatehouse binary
//!
//! ```text
//! cli/
//! ├── commands/     # serve, hash-password
//! └── error.rs      # User-friendly error display
//! ```

pub mod commands;
pub mod error;

use std::io::IsTerminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::error::GatewayResult;

/// gatehouse - authenticating reverse-proxy gateway
///
/// Issues short-lived bearer tokens for configured users and forwards their
/// requests to named backends.
#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Authenticating reverse-proxy gateway",
    long_about = "Exchanges Basic credentials for short-lived bearer tokens and proxies\n\
                  token-bearing requests to named backends, subject to per-route allow-lists.",
    author
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: commands::Command,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the command fails.
    pub async fn execute(self) -> GatewayResult<()> {
        self.init_tracing();

        // Colored output only ever goes to stderr, through display_error
        if self.no_color || !std::io::stderr().is_terminal() {
            colored::control::set_override(false);
        }

        self.command.execute().await
    }

    /// Default log filter for the verbosity flags
    fn default_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Initialize tracing; `RUST_LOG` overrides the verbosity flags
    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_filter()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
