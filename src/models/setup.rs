//! Toolchain setup diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// One problem found while validating the toolchain configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum SetupDiagnostic {
    /// No executable path has been configured
    NotConfigured,
    /// The path does not exist, cannot be run, or prints nothing recognisable
    NotExecutable,
    /// The tool runs but its version is outside the supported family
    UnsupportedVersion { found: String },
}

impl SetupDiagnostic {
    /// Stable identifier used by callers and the UI
    pub fn code(&self) -> &'static str {
        match self {
            SetupDiagnostic::NotConfigured => "NotConfigured",
            SetupDiagnostic::NotExecutable => "NotExecutable",
            SetupDiagnostic::UnsupportedVersion { .. } => "UnsupportedVersion",
        }
    }
}

impl fmt::Display for SetupDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupDiagnostic::NotConfigured => {
                write!(f, "No path has been configured, check the flasher settings.")
            }
            SetupDiagnostic::NotExecutable => write!(
                f,
                "The configured path does not point to a working toolchain executable."
            ),
            SetupDiagnostic::UnsupportedVersion { found } => write!(
                f,
                "The configured toolchain version ({}) is not supported.",
                found
            ),
        }
    }
}
