use async_trait::async_trait;
use log::info;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{LineSink, Toolchain, first_capture, invoke, invoke_json, matches_pattern, required};
use crate::config::PlatformType;
use crate::errors::Result;
use crate::models::{ArtifactKind, FirmwareArtifact, FlashOptions};

/// arduino-cli release family this integration speaks to
const SUPPORTED_VERSIONS: &str = r"^(0\.(1[5-9]|[2-9][0-9])|1\.[0-9]+)\.[0-9]+";

/// arduino-cli backend: builds sketches and uploads sketches or Intel HEX images
pub struct ArduinoCli {
    cli_path: Option<PathBuf>,
    sketch_ino: String,
}

impl ArduinoCli {
    pub fn new(cli_path: Option<PathBuf>, sketch_ino: String) -> Self {
        Self {
            cli_path,
            sketch_ino,
        }
    }

    /// Board identifier with every other option appended as `key=value` board options
    pub fn fqbn(options: &FlashOptions) -> Result<String> {
        let base = required(options.get("fqbn").unwrap_or_default(), "fqbn")?;

        let board_options: Vec<String> = options
            .iter()
            .filter(|(key, value)| *key != "fqbn" && !value.trim().is_empty())
            .map(|(key, value)| format!("{}={}", key, value.trim()))
            .collect();

        if board_options.is_empty() {
            Ok(base.to_string())
        } else {
            Ok(format!("{}:{}", base, board_options.join(",")))
        }
    }

    fn json_args(args: &[&str]) -> Vec<String> {
        args.iter()
            .copied()
            .chain(["--format", "json"])
            .map(str::to_string)
            .collect()
    }

    fn compile_args(fqbn: &str, project_dir: &Path) -> Vec<String> {
        vec![
            "compile".to_string(),
            "--fqbn".to_string(),
            fqbn.to_string(),
            project_dir.display().to_string(),
        ]
    }

    fn upload_args(fqbn: &str, port: &str, artifact: &FirmwareArtifact) -> Vec<String> {
        let mut args = vec![
            "upload".to_string(),
            "--fqbn".to_string(),
            fqbn.to_string(),
            "--port".to_string(),
            port.to_string(),
        ];
        match artifact.kind {
            ArtifactKind::SourceProject => args.push(artifact.location.display().to_string()),
            ArtifactKind::PrecompiledBinary => {
                args.push("--input-file".to_string());
                args.push(artifact.location.display().to_string());
            }
        }
        args
    }
}

#[async_trait]
impl Toolchain for ArduinoCli {
    fn platform(&self) -> PlatformType {
        PlatformType::Arduino
    }

    fn executable(&self) -> Option<&Path> {
        self.cli_path.as_deref()
    }

    fn entry_point(&self) -> &str {
        &self.sketch_ino
    }

    fn accepts_precompiled(&self) -> bool {
        true
    }

    fn version_args(&self) -> Vec<String> {
        Self::json_args(&["version"])
    }

    fn parse_version(&self, stdout: &str) -> Option<String> {
        // `--format json` prints {"VersionString": "..."}; older releases print plain text
        if let Ok(json) = serde_json::from_str::<Value>(stdout) {
            if let Some(version) = json.get("VersionString").and_then(Value::as_str) {
                return Some(version.to_string());
            }
        }
        if !stdout.to_ascii_lowercase().contains("arduino") {
            return None;
        }
        first_capture(r"Version:\s*([0-9]+\.[0-9]+\.[0-9]+\S*)", stdout)
    }

    fn is_supported_version(&self, version: &str) -> bool {
        matches_pattern(SUPPORTED_VERSIONS, version)
    }

    fn validate_flash_options(&self, options: &FlashOptions) -> Result<()> {
        Self::fqbn(options).map(|_| ())
    }

    async fn compile(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        sink: Option<&LineSink>,
    ) -> Result<()> {
        let fqbn = Self::fqbn(options)?;
        info!("🏗️ Compiling {} for {}", artifact.location.display(), fqbn);
        invoke(
            self.executable(),
            Self::compile_args(&fqbn, &artifact.location),
            sink,
        )
        .await?;
        info!("✅ Arduino build completed successfully");
        Ok(())
    }

    async fn upload(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        port: &str,
        sink: Option<&LineSink>,
    ) -> Result<()> {
        let fqbn = Self::fqbn(options)?;
        info!("🔥 Uploading {} to {}", artifact.location.display(), port);
        invoke(
            self.executable(),
            Self::upload_args(&fqbn, port, artifact),
            sink,
        )
        .await?;
        info!("✅ Arduino upload completed successfully");
        Ok(())
    }

    async fn core_search(&self, query: &str) -> Result<Value> {
        let query = required(query, "query")?;
        invoke_json(self.executable(), Self::json_args(&["core", "search", query])).await
    }

    async fn lib_search(&self, query: &str) -> Result<Value> {
        let query = required(query, "query")?;
        invoke_json(self.executable(), Self::json_args(&["lib", "search", query])).await
    }

    async fn core_install(&self, core: &str) -> Result<Value> {
        let core = required(core, "core")?;
        invoke_json(self.executable(), Self::json_args(&["core", "install", core])).await
    }

    async fn lib_install(&self, lib: &str) -> Result<Value> {
        let lib = required(lib, "lib")?;
        invoke_json(self.executable(), Self::json_args(&["lib", "install", lib])).await
    }

    async fn core_uninstall(&self, core: &str) -> Result<Value> {
        let core = required(core, "core")?;
        invoke_json(self.executable(), Self::json_args(&["core", "uninstall", core])).await
    }

    async fn lib_uninstall(&self, lib: &str) -> Result<Value> {
        let lib = required(lib, "lib")?;
        invoke_json(self.executable(), Self::json_args(&["lib", "uninstall", lib])).await
    }

    async fn board_listall(&self) -> Result<Value> {
        invoke_json(self.executable(), Self::json_args(&["board", "listall"])).await
    }

    async fn board_details(&self, fqbn: &str) -> Result<Value> {
        let fqbn = required(fqbn, "fqbn")?;
        invoke_json(
            self.executable(),
            Self::json_args(&["board", "details", "-b", fqbn]),
        )
        .await
    }
}
