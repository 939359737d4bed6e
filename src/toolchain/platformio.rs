use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};

use super::{LineSink, Toolchain, first_capture, invoke, matches_pattern, required};
use crate::config::PlatformType;
use crate::errors::{FlasherError, Result};
use crate::models::{ArtifactKind, FirmwareArtifact, FlashOptions};

const SUPPORTED_VERSIONS: &str = r"^[4-6]\.[0-9]+\.[0-9]+";

/// PlatformIO Core backend: builds and uploads `platformio.ini` projects
pub struct PlatformIo {
    cli_path: Option<PathBuf>,
}

impl PlatformIo {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    fn env(options: &FlashOptions) -> Result<&str> {
        required(options.get("env").unwrap_or_default(), "env")
    }

    fn run_args(project_dir: &Path, env: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            project_dir.display().to_string(),
            "-e".to_string(),
            env.to_string(),
        ]
    }

    fn source_only(artifact: &FirmwareArtifact) -> Result<()> {
        match artifact.kind {
            ArtifactKind::SourceProject => Ok(()),
            ArtifactKind::PrecompiledBinary => Err(FlasherError::Unsupported(
                "PlatformIO can only flash source projects".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Toolchain for PlatformIo {
    fn platform(&self) -> PlatformType {
        PlatformType::PlatformIo
    }

    fn executable(&self) -> Option<&Path> {
        self.cli_path.as_deref()
    }

    fn entry_point(&self) -> &str {
        "platformio.ini"
    }

    fn accepts_precompiled(&self) -> bool {
        false
    }

    fn version_args(&self) -> Vec<String> {
        vec!["--version".to_string()]
    }

    fn parse_version(&self, stdout: &str) -> Option<String> {
        if !stdout.to_ascii_lowercase().contains("platformio") {
            return None;
        }
        first_capture(r"(?i)version\s+([0-9]+\.[0-9]+\.[0-9]+\S*)", stdout)
    }

    fn is_supported_version(&self, version: &str) -> bool {
        matches_pattern(SUPPORTED_VERSIONS, version)
    }

    fn validate_flash_options(&self, options: &FlashOptions) -> Result<()> {
        Self::env(options).map(|_| ())
    }

    async fn compile(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        sink: Option<&LineSink>,
    ) -> Result<()> {
        Self::source_only(artifact)?;
        let env = Self::env(options)?;
        info!("🏗️ Building PlatformIO environment {}", env);
        invoke(
            self.executable(),
            Self::run_args(&artifact.location, env),
            sink,
        )
        .await?;
        info!("✅ PlatformIO build completed successfully");
        Ok(())
    }

    async fn upload(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        port: &str,
        sink: Option<&LineSink>,
    ) -> Result<()> {
        Self::source_only(artifact)?;
        let env = Self::env(options)?;
        let mut args = Self::run_args(&artifact.location, env);
        args.extend(
            ["-t", "upload", "--upload-port", port]
                .into_iter()
                .map(str::to_string),
        );
        info!("🔥 Uploading PlatformIO environment {} to {}", env, port);
        invoke(self.executable(), args, sink).await?;
        info!("✅ PlatformIO upload completed successfully");
        Ok(())
    }
}
