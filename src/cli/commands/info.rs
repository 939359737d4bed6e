use anyhow::Result;
use std::path::Path;

use super::CliContext;
use crate::models::FirmwareArtifact;

/// Stage a file without flashing and describe it
pub async fn execute_info_command(ctx: &CliContext, file: &Path) -> Result<()> {
    let orchestrator = ctx.flasher.orchestrator().await;
    let artifact = orchestrator.upload(file).await?;
    print_artifact(&artifact);
    Ok(())
}

pub(crate) fn print_artifact(artifact: &FirmwareArtifact) {
    println!("📦 Firmware: {:?}", artifact.kind);
    println!("   Location: {}", artifact.location.display());
    if let Some(version) = &artifact.version {
        println!("   Version:  {}", version);
    }
    if let Some(author) = &artifact.author {
        println!("   Author:   {}", author);
    }
}
