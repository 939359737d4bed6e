use anyhow::{Result, bail};
use log::{debug, warn};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

use super::CliContext;
use super::info::print_artifact;
use crate::device::DeviceController;
use crate::models::{ConnectionParams, FlashOptions, FlashStatus, FlashStep, FlasherEvent};
use crate::services::PublishedMessage;

pub async fn execute_flash_command(
    ctx: &CliContext,
    file: Option<PathBuf>,
    url: Option<String>,
    port: String,
    baud: u32,
    options: Vec<(String, String)>,
) -> Result<()> {
    println!("⚡ Marlin Flasher");

    let orchestrator = ctx.flasher.orchestrator().await;

    let diagnostics = orchestrator.check_setup_errors().await;
    if let Some(diagnostic) = diagnostics.first() {
        bail!("Toolchain not usable: {}", diagnostic);
    }

    let artifact = match (file, url) {
        (Some(file), _) => {
            println!("📁 Staging {}", file.display());
            orchestrator.upload(&file).await?
        }
        (None, Some(url)) => {
            println!("🌐 Downloading {}", url);
            orchestrator.download(&url).await?
        }
        (None, None) => bail!("Either --file or --url is required"),
    };
    print_artifact(&artifact);

    ctx.device
        .connect(&ConnectionParams {
            port,
            baudrate: Some(baud),
            profile: None,
        })
        .await?;

    let rx = ctx.publisher.subscribe();
    let progress_handle = tokio::spawn(print_progress(rx));

    let options: FlashOptions = options.into_iter().collect();
    let ticket = match orchestrator.flash(options).await {
        Ok(ticket) => ticket,
        Err(e) => {
            progress_handle.abort();
            return Err(e.into());
        }
    };
    debug!("Flash ticket {}", ticket.id);

    let status = orchestrator.wait_for_flash().await;
    if let Err(e) = progress_handle.await {
        debug!("Progress printer stopped: {}", e);
    }

    if !status.success {
        if let Some(output) = &status.error_output {
            eprintln!("{}", output);
        }
        bail!(
            "{}",
            status.message.unwrap_or_else(|| "Flash failed".to_string())
        );
    }

    // The port was reopened synchronously, so the printer is connected now
    match orchestrator.handle_connected_event().await {
        Ok(true) => println!("📜 Post-flash script sent"),
        Ok(false) => {}
        Err(e) => warn!("Post-flash script failed: {}", e),
    }

    println!("🎉 Flash operation completed!");
    Ok(())
}

/// Print published events until a terminal flash status arrives
async fn print_progress(mut rx: tokio::sync::broadcast::Receiver<PublishedMessage>) {
    loop {
        let message = match rx.recv().await {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Skipped {} progress messages", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match message.topic.as_str() {
            FlasherEvent::TOPIC_TOOLCHAIN_OUTPUT => {
                if let Some(line) = message.payload["line"].as_str() {
                    println!("  {}", line);
                }
            }
            FlasherEvent::TOPIC_FLASH_STATUS => {
                let Ok(status) = serde_json::from_value::<FlashStatus>(message.payload) else {
                    continue;
                };
                match status.step {
                    FlashStep::Compiling => println!("🔨 Compiling... [{}%]", status.progress),
                    FlashStep::Uploading => println!("📤 Uploading... [{}%]", status.progress),
                    FlashStep::Done => println!("✅ Flash completed successfully [100%]"),
                    FlashStep::Failed => println!(
                        "❌ {}",
                        status.message.as_deref().unwrap_or("Flash failed")
                    ),
                    FlashStep::Idle => {}
                }
                if status.finished {
                    break;
                }
            }
            _ => {}
        }
    }
}
