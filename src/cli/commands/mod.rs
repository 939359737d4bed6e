//! CLI command implementations

pub mod check;
pub mod flash;
pub mod info;
pub mod manage;
pub mod ports;

use anyhow::Result;
use std::sync::Arc;

use crate::cli::args::{Cli, Commands};
use crate::config::{FileSettingsStore, SettingsStore};
use crate::device::{DeviceController, SerialPortDevice};
use crate::services::{BroadcastPublisher, EventPublisher, MarlinFlasher};

/// Collaborators every command works with
pub struct CliContext {
    pub store: Arc<FileSettingsStore>,
    pub device: Arc<SerialPortDevice>,
    pub publisher: Arc<BroadcastPublisher>,
    pub flasher: MarlinFlasher,
}

impl CliContext {
    pub fn new(cli: &Cli) -> Self {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(FileSettingsStore::default_path);
        let store = Arc::new(FileSettingsStore::load(path));
        let device = Arc::new(SerialPortDevice::new());
        let publisher = Arc::new(BroadcastPublisher::default());

        let flasher = MarlinFlasher::new(
            store.clone() as Arc<dyn SettingsStore>,
            device.clone() as Arc<dyn DeviceController>,
            publisher.clone() as Arc<dyn EventPublisher>,
        );

        Self {
            store,
            device,
            publisher,
            flasher,
        }
    }
}

/// Execute a CLI command
pub async fn execute_command(cli: &Cli) -> Result<()> {
    if let Commands::Ports = cli.command {
        return ports::execute_ports_command().await;
    }

    let ctx = CliContext::new(cli);
    match cli.command.clone() {
        Commands::Check => check::execute_check_command(&ctx).await,
        Commands::Flash {
            file,
            url,
            port,
            baud,
            options,
        } => flash::execute_flash_command(&ctx, file, url, port, baud, options).await,
        Commands::Info { file } => info::execute_info_command(&ctx, &file).await,
        Commands::Core { action } => manage::execute_core_command(&ctx, action).await,
        Commands::Lib { action } => manage::execute_lib_command(&ctx, action).await,
        Commands::Board { action } => manage::execute_board_command(&ctx, action).await,
        Commands::LastOptions => manage::execute_last_options_command(&ctx).await,
        Commands::Ports => ports::execute_ports_command().await,
    }
}
