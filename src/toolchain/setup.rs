//! Toolchain setup validation

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::Toolchain;
use super::runner::ToolchainRunner;
use crate::models::SetupDiagnostic;

/// Probes the configured toolchain and reports problems as values
pub struct SetupValidator;

impl SetupValidator {
    /// Validate `toolchain`'s executable. An empty list means the setup is usable.
    ///
    /// Stops at the first problem found; never fails.
    pub async fn check<T: Toolchain + ?Sized>(toolchain: &T) -> Vec<SetupDiagnostic> {
        let platform = toolchain.platform();

        let configured = match toolchain.executable() {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => {
                info!("⚠️ No {} executable configured", platform);
                return vec![SetupDiagnostic::NotConfigured];
            }
        };

        let Some(executable) = resolve_executable(configured) else {
            warn!(
                "Configured {} executable {} does not exist",
                platform,
                configured.display()
            );
            return vec![SetupDiagnostic::NotExecutable];
        };

        let output = ToolchainRunner::run(&executable, &toolchain.version_args(), None).await;
        if !output.succeeded {
            warn!(
                "{} version query failed: {}",
                executable.display(),
                output.failure_text()
            );
            return vec![SetupDiagnostic::NotExecutable];
        }

        let Some(version) = toolchain.parse_version(&output.stdout) else {
            warn!(
                "Could not read a {} version from: {}",
                platform, output.stdout
            );
            return vec![SetupDiagnostic::NotExecutable];
        };

        if !toolchain.is_supported_version(&version) {
            warn!("Unsupported {} version {}", platform, version);
            return vec![SetupDiagnostic::UnsupportedVersion { found: version }];
        }

        debug!("✅ {} {} at {}", platform, version, executable.display());
        Vec::new()
    }
}

/// Resolve a configured executable: explicit paths must exist, bare names are looked up in PATH
pub(crate) fn resolve_executable(configured: &Path) -> Option<PathBuf> {
    if configured.components().count() > 1 || configured.is_absolute() {
        if configured.is_file() {
            Some(configured.to_path_buf())
        } else {
            None
        }
    } else {
        which::which(configured).ok()
    }
}
