//! Toolchain management passthroughs

use anyhow::Result;
use serde_json::Value;

use super::CliContext;
use crate::cli::args::{BoardAction, PackageAction};

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute_core_command(ctx: &CliContext, action: PackageAction) -> Result<()> {
    let orchestrator = ctx.flasher.orchestrator().await;
    let value = match action {
        PackageAction::Search { query } => orchestrator.core_search(&query).await?,
        PackageAction::Install { id } => orchestrator.core_install(&id).await?,
        PackageAction::Uninstall { id } => orchestrator.core_uninstall(&id).await?,
    };
    print_json(&value)
}

pub async fn execute_lib_command(ctx: &CliContext, action: PackageAction) -> Result<()> {
    let orchestrator = ctx.flasher.orchestrator().await;
    let value = match action {
        PackageAction::Search { query } => orchestrator.lib_search(&query).await?,
        PackageAction::Install { id } => orchestrator.lib_install(&id).await?,
        PackageAction::Uninstall { id } => orchestrator.lib_uninstall(&id).await?,
    };
    print_json(&value)
}

pub async fn execute_board_command(ctx: &CliContext, action: BoardAction) -> Result<()> {
    let orchestrator = ctx.flasher.orchestrator().await;
    let value = match action {
        BoardAction::List => orchestrator.board_listall().await?,
        BoardAction::Details { fqbn } => orchestrator.board_details(&fqbn).await?,
    };
    print_json(&value)
}

pub async fn execute_last_options_command(ctx: &CliContext) -> Result<()> {
    let orchestrator = ctx.flasher.orchestrator().await;
    match orchestrator.last_flash_options() {
        Some(options) if !options.is_empty() => {
            for (key, value) in options.iter() {
                println!("{}={}", key, value);
            }
        }
        _ => println!("No previous flash options for {}", orchestrator.platform()),
    }
    Ok(())
}
