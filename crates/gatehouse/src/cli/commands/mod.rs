//! CLI command implementations

pub mod hash_password;
pub mod serve;

use clap::Subcommand;

use crate::error::GatewayResult;

/// All available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway
    #[command(visible_alias = "s")]
    Serve(serve::ServeCommand),

    /// Print a bcrypt hash for use in the configuration file
    HashPassword(hash_password::HashPasswordCommand),
}

impl Command {
    /// Execute the command
    pub async fn execute(self) -> GatewayResult<()> {
        match self {
            Command::Serve(cmd) => cmd.execute().await,
            Command::HashPassword(cmd) => cmd.execute().await,
        }
    }
}
