//! User-friendly error formatting for CLI

use colored::Colorize;

use crate::error::GatewayError;

/// Format an error for CLI display
#[must_use]
pub fn format_error(error: &GatewayError) -> String {
    match error {
        GatewayError::Configuration { message, key } => {
            let context = key
                .as_deref()
                .map(|k| format!(" ({k})"))
                .unwrap_or_default();
            format!(
                "{} Configuration error{}\n  {}\n\n{}\n  {}",
                "✗".red().bold(),
                context,
                message,
                "Suggestion:".yellow(),
                "Check GATEHOUSE_CONFIG, GATEHOUSE_PORT and the configuration file contents"
            )
        }
        GatewayError::Io(err) => {
            format!(
                "{} I/O error\n  {}\n\n{}\n  {}",
                "✗".red().bold(),
                err,
                "Suggestion:".yellow(),
                "Check that the listen address is free and file permissions are correct"
            )
        }
        _ => format!("{} {}", "✗".red().bold(), error),
    }
}

/// Display an error to stderr and return exit code
#[must_use]
pub fn display_error(error: &GatewayError) -> i32 {
    eprintln!("{}", format_error(error));
    1
}
