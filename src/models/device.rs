//! Printer connection models

use serde::{Deserialize, Serialize};

/// Transport the printer connection currently runs over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Serial,
    Other(String),
}

impl TransportKind {
    pub fn is_serial(&self) -> bool {
        matches!(self, TransportKind::Serial)
    }
}

/// Snapshot of the printer connection as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host-side state descriptor, e.g. "Operational" or "Closed"
    pub state: String,
    pub port: Option<String>,
    pub baudrate: Option<u32>,
    pub profile: Option<String>,
}

/// Parameters captured before disconnecting so the link can be restored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub port: String,
    pub baudrate: Option<u32>,
    pub profile: Option<String>,
}
