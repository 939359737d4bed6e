//! Flash-related data models

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::artifact::ArtifactKind;

/// Flat key/value options supplied with each flash request
/// (board identifier, environment name, board option pairs)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlashOptions(BTreeMap<String, String>);

impl FlashOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`, treating blank values as missing
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlashOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Phase of the current or last flash attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashStep {
    Idle,
    Compiling,
    Uploading,
    Done,
    Failed,
}

/// Observable state of a flash attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashStatus {
    pub step: FlashStep,
    /// 0..=100, never decreasing within one attempt
    pub progress: u8,
    pub finished: bool,
    /// Only meaningful once `finished` is set
    pub success: bool,
    pub message: Option<String>,
    pub error_output: Option<String>,
}

impl Default for FlashStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl FlashStatus {
    pub fn idle() -> Self {
        Self {
            step: FlashStep::Idle,
            progress: 0,
            finished: false,
            success: false,
            message: None,
            error_output: None,
        }
    }

    pub fn compiling() -> Self {
        Self {
            step: FlashStep::Compiling,
            message: Some("Compiling firmware".to_string()),
            ..Self::idle()
        }
    }

    /// Upload phase; `progress` is 50 after a compile, 0 for a precompiled image
    pub fn uploading(progress: u8) -> Self {
        Self {
            step: FlashStep::Uploading,
            progress,
            message: Some("Uploading firmware".to_string()),
            ..Self::idle()
        }
    }

    pub fn done() -> Self {
        Self {
            step: FlashStep::Done,
            progress: 100,
            finished: true,
            success: true,
            message: Some("Flash successful".to_string()),
            error_output: None,
        }
    }

    pub fn failed(message: impl Into<String>, error_output: Option<String>) -> Self {
        Self {
            step: FlashStep::Failed,
            progress: 100,
            finished: true,
            success: false,
            message: Some(message.into()),
            error_output,
        }
    }

    /// True while a compile or upload is running
    pub fn in_progress(&self) -> bool {
        matches!(self.step, FlashStep::Compiling | FlashStep::Uploading)
    }
}

/// Synchronous acknowledgement returned when a flash task is started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashTicket {
    pub id: String,
    pub kind: ArtifactKind,
    pub started_at: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_option_is_missing() {
        let options = FlashOptions::new().with("fqbn", "  ").with("env", "mega2560");
        assert_eq!(options.get("fqbn"), None);
        assert_eq!(options.get("env"), Some("mega2560"));
        assert_eq!(options.len(), 2);
    }

    #[test]
    fn test_status_constructors() {
        assert_eq!(FlashStatus::default().step, FlashStep::Idle);
        assert!(FlashStatus::compiling().in_progress());

        let uploading = FlashStatus::uploading(50);
        assert_eq!(uploading.progress, 50);
        assert!(!uploading.finished);

        let done = FlashStatus::done();
        assert!(done.finished && done.success);
        assert_eq!(done.progress, 100);

        let failed = FlashStatus::failed("boom", Some("stderr".to_string()));
        assert!(failed.finished && !failed.success);
        assert_eq!(failed.error_output.as_deref(), Some("stderr"));
    }

    #[test]
    fn test_options_serialize_as_flat_map() {
        let options = FlashOptions::new().with("fqbn", "arduino:avr:mega").with("cpu", "atmega2560");
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["fqbn"], "arduino:avr:mega");
        assert_eq!(json["cpu"], "atmega2560");
    }
}
