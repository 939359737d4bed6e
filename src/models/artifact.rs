//! Staged firmware data model

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What kind of payload is staged, which decides whether a compile step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Extracted source tree with a build descriptor (sketch or platformio.ini)
    SourceProject,
    /// Ready-to-upload Intel HEX image
    PrecompiledBinary,
}

impl ArtifactKind {
    pub fn needs_compile(&self) -> bool {
        matches!(self, ArtifactKind::SourceProject)
    }
}

/// The firmware currently staged for flashing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareArtifact {
    pub kind: ArtifactKind,
    /// Project directory holding the entry point, or the binary file itself
    pub location: PathBuf,
    /// Best-effort version read from the project sources
    pub version: Option<String>,
    /// Best-effort author read from the project sources
    pub author: Option<String>,
    pub staged_at: DateTime<Local>,
}

impl FirmwareArtifact {
    pub fn source_project(location: PathBuf, metadata: FirmwareMetadata) -> Self {
        Self {
            kind: ArtifactKind::SourceProject,
            location,
            version: metadata.version,
            author: metadata.author,
            staged_at: Local::now(),
        }
    }

    pub fn precompiled(location: PathBuf) -> Self {
        Self {
            kind: ArtifactKind::PrecompiledBinary,
            location,
            version: None,
            author: None,
            staged_at: Local::now(),
        }
    }
}

/// Optional metadata scraped from source files next to the entry point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareMetadata {
    pub version: Option<String>,
    pub author: Option<String>,
}

impl FirmwareMetadata {
    pub fn is_complete(&self) -> bool {
        self.version.is_some() && self.author.is_some()
    }
}
