//! Events pushed to subscribers while staging and flashing

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::artifact::FirmwareArtifact;
use super::flash::FlashStatus;

/// Which pipe a toolchain line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events published by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum FlasherEvent {
    /// A flash status transition
    FlashStatus(FlashStatus),
    /// One line printed by the compiler or uploader
    ToolchainOutput(OutputStream, String),
    /// A new firmware has been staged
    FirmwareStaged(FirmwareArtifact),
    /// The staged firmware was discarded
    FirmwareCleared,
    /// The post-flash script was sent after reconnection
    PostFlashScriptSent(usize),
}

impl FlasherEvent {
    pub const TOPIC_FLASH_STATUS: &'static str = "flash_status";
    pub const TOPIC_TOOLCHAIN_OUTPUT: &'static str = "toolchain_output";
    pub const TOPIC_FIRMWARE: &'static str = "firmware";
    pub const TOPIC_POST_FLASH: &'static str = "post_flash_script";

    pub fn topic(&self) -> &'static str {
        match self {
            FlasherEvent::FlashStatus(_) => Self::TOPIC_FLASH_STATUS,
            FlasherEvent::ToolchainOutput(..) => Self::TOPIC_TOOLCHAIN_OUTPUT,
            FlasherEvent::FirmwareStaged(_) | FlasherEvent::FirmwareCleared => {
                Self::TOPIC_FIRMWARE
            }
            FlasherEvent::PostFlashScriptSent(_) => Self::TOPIC_POST_FLASH,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            FlasherEvent::FlashStatus(status) => json!(status),
            FlasherEvent::ToolchainOutput(stream, line) => json!({
                "stream": stream,
                "line": line,
            }),
            FlasherEvent::FirmwareStaged(artifact) => json!({ "firmware": artifact }),
            FlasherEvent::FirmwareCleared => json!({ "firmware": null }),
            FlasherEvent::PostFlashScriptSent(count) => json!({ "commands": count }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_payload_shape() {
        let event = FlasherEvent::FlashStatus(FlashStatus::uploading(50));
        assert_eq!(event.topic(), "flash_status");
        let payload = event.payload();
        assert_eq!(payload["step"], "uploading");
        assert_eq!(payload["progress"], 50);
        assert_eq!(payload["finished"], false);
    }

    #[test]
    fn test_output_payload_shape() {
        let event = FlasherEvent::ToolchainOutput(OutputStream::Stderr, "warning".to_string());
        assert_eq!(event.topic(), "toolchain_output");
        assert_eq!(event.payload()["stream"], "stderr");
        assert_eq!(event.payload()["line"], "warning");
    }
}
