//! Toolchain backends and the capability interface the orchestrator drives

pub mod arduino;
pub mod platformio;
pub mod runner;
pub mod setup;

pub use arduino::ArduinoCli;
pub use platformio::PlatformIo;
pub use runner::{EXECUTABLE_NOT_FOUND, LineSink, ToolchainOutput, ToolchainRunner};
pub use setup::SetupValidator;

use async_trait::async_trait;
use log::{error, info};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::config::{FlasherSettings, PlatformType};
use crate::errors::{FlasherError, Result};
use crate::models::{FirmwareArtifact, FlashOptions, SetupDiagnostic};

/// Message returned by backends for operations they do not offer
pub const UNSUPPORTED_ENDPOINT: &str =
    "This endpoint is not supported by the active firmware platform";

/// Operations every toolchain backend must support
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Backend this toolchain implements
    fn platform(&self) -> PlatformType;

    /// Configured executable, if any
    fn executable(&self) -> Option<&Path>;

    /// File name marking the project root inside an uploaded archive
    fn entry_point(&self) -> &str;

    /// Whether precompiled Intel HEX images can be uploaded directly
    fn accepts_precompiled(&self) -> bool;

    /// Arguments that make the executable print its version
    fn version_args(&self) -> Vec<String>;

    /// Extract a version string from the version query output
    fn parse_version(&self, stdout: &str) -> Option<String>;

    /// Whether `version` belongs to the supported release family
    fn is_supported_version(&self, version: &str) -> bool;

    /// Check the flash request carries everything this backend needs
    fn validate_flash_options(&self, options: &FlashOptions) -> Result<()>;

    /// Validate the toolchain configuration
    async fn check_setup(&self) -> Vec<SetupDiagnostic> {
        SetupValidator::check(self).await
    }

    /// Build a staged source project
    async fn compile(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        sink: Option<&LineSink>,
    ) -> Result<()>;

    /// Upload the compiled project or precompiled image to `port`
    async fn upload(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        port: &str,
        sink: Option<&LineSink>,
    ) -> Result<()>;

    async fn core_search(&self, _query: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn lib_search(&self, _query: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn core_install(&self, _core: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn lib_install(&self, _lib: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn core_uninstall(&self, _core: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn lib_uninstall(&self, _lib: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn board_listall(&self) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }

    async fn board_details(&self, _fqbn: &str) -> Result<Value> {
        Err(FlasherError::Unsupported(UNSUPPORTED_ENDPOINT.to_string()))
    }
}

/// Build the backend selected in `settings`
pub fn build_toolchain(settings: &FlasherSettings) -> Arc<dyn Toolchain> {
    info!("🔧 Using {} toolchain backend", settings.platform);
    match settings.platform {
        PlatformType::Arduino => Arc::new(ArduinoCli::new(
            settings.arduino.cli_path.clone(),
            settings.arduino.sketch_ino.clone(),
        )),
        PlatformType::PlatformIo => Arc::new(PlatformIo::new(settings.platformio.cli_path.clone())),
    }
}

/// Run the configured executable and turn a non-zero exit into a toolchain error
pub(crate) async fn invoke(
    executable: Option<&Path>,
    args: Vec<String>,
    sink: Option<&LineSink>,
) -> Result<ToolchainOutput> {
    let executable = executable
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| FlasherError::Config(SetupDiagnostic::NotConfigured.to_string()))?;

    let output = ToolchainRunner::run(executable, &args, sink).await;
    if output.succeeded {
        Ok(output)
    } else {
        let command = ToolchainRunner::command_line(executable, &args);
        error!("❌ {} failed", command);
        Err(FlasherError::Toolchain {
            command,
            output: output.failure_text(),
        })
    }
}

/// Like [`invoke`], parsing stdout as JSON (empty output becomes `null`)
pub(crate) async fn invoke_json(executable: Option<&Path>, args: Vec<String>) -> Result<Value> {
    let output = invoke(executable, args, None).await?;
    if output.stdout.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&output.stdout)?)
}

/// Reject blank request fields with the field-specific message
pub(crate) fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(FlasherError::Validation(format!(
            "The {} field is missing",
            field
        )))
    } else {
        Ok(trimmed)
    }
}

/// First capture group of `pattern` in `text`
pub(crate) fn first_capture(pattern: &str, text: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(regex) => regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        Err(e) => {
            error!("Invalid pattern {}: {}", pattern, e);
            None
        }
    }
}

/// Whether `pattern` matches anywhere in `text`
pub(crate) fn matches_pattern(pattern: &str, text: &str) -> bool {
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(text),
        Err(e) => {
            error!("Invalid pattern {}: {}", pattern, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("  Marlin ", "query").unwrap(), "Marlin");
        let err = required("   ", "query").unwrap_err();
        assert_eq!(err.to_string(), "The query field is missing");
    }

    #[test]
    fn test_first_capture() {
        assert_eq!(
            first_capture(r"version (\d+\.\d+\.\d+)", "PlatformIO Core, version 6.1.15"),
            Some("6.1.15".to_string())
        );
        assert_eq!(first_capture(r"version (\d+)", "nothing here"), None);
    }

    #[test]
    fn test_build_toolchain_follows_settings() {
        let mut settings = FlasherSettings::default();
        assert_eq!(build_toolchain(&settings).platform(), PlatformType::Arduino);
        settings.platform = PlatformType::PlatformIo;
        let toolchain = build_toolchain(&settings);
        assert_eq!(toolchain.platform(), PlatformType::PlatformIo);
        assert_eq!(toolchain.entry_point(), "platformio.ini");
    }

    #[tokio::test]
    async fn test_invoke_without_executable_is_config_error() {
        let err = invoke(None, vec!["version".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, FlasherError::Config(_)));
    }
}
