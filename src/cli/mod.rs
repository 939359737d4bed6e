//! Command Line Interface module
//!
//! Argument parsing and the command implementations driving
//! [`MarlinFlasher`](crate::services::MarlinFlasher).

pub mod args;
pub mod commands;

pub use args::*;

use anyhow::Result;

/// Main CLI application runner
pub async fn run(cli: Cli) -> Result<()> {
    commands::execute_command(&cli).await
}
