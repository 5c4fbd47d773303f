//! Hash-password command implementation
//!
//! Prints a bcrypt hash suitable for a `password_hash` entry in the
//! configuration file.

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::{GatewayError, GatewayResult};

/// Print a bcrypt hash for a password
///
/// # Examples
///
///   gatehouse hash-password 'correct horse battery staple'
///   echo -n 'correct horse battery staple' | gatehouse hash-password
#[derive(Debug, Args)]
pub struct HashPasswordCommand {
    /// Password to hash; read from the first line of stdin when omitted
    pub password: Option<String>,

    /// bcrypt cost factor
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    pub cost: u32,
}

impl HashPasswordCommand {
    /// Execute the hash-password command
    pub async fn execute(self) -> GatewayResult<()> {
        let password = match self.password {
            Some(password) => password,
            None => read_password_line().await?,
        };
        if password.is_empty() {
            return Err(GatewayError::configuration("password must not be empty"));
        }

        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| GatewayError::internal(format!("Hashing aborted: {e}")))?
            .map_err(|e| GatewayError::internal(format!("Hashing failed: {e}")))?;

        println!("{hash}");
        Ok(())
    }
}

async fn read_password_line() -> GatewayResult<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
