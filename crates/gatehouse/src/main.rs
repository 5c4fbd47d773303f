//! gatehouse CLI entry point

#![warn(clippy::all)]

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = gatehouse::cli::Cli::parse();

    if let Err(e) = cli.execute().await {
        let exit_code = gatehouse::cli::error::display_error(&e);
        std::process::exit(exit_code);
    }
}
