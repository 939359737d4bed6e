//! Flasher configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::FlashOptions;

/// Supported toolchain backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    #[default]
    Arduino,
    #[serde(rename = "platformio")]
    PlatformIo,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Arduino => "arduino",
            PlatformType::PlatformIo => "platformio",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arduino" => Ok(PlatformType::Arduino),
            "platformio" | "pio" => Ok(PlatformType::PlatformIo),
            other => Err(format!(
                "Unknown platform '{}'. Expected 'arduino' or 'platformio'",
                other
            )),
        }
    }
}

/// Main flasher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlasherSettings {
    /// Active toolchain backend
    pub platform: PlatformType,
    pub arduino: ArduinoSettings,
    pub platformio: PlatformIoSettings,
    /// Largest accepted upload, in bytes
    pub max_upload_size: u64,
    /// Newline separated printer commands sent before disconnecting
    pub pre_flash_script: Option<String>,
    /// Seconds to wait after the pre-flash script
    pub pre_flash_delay: u64,
    /// Newline separated printer commands sent once the printer is back
    pub post_flash_script: Option<String>,
    /// Seconds to wait between a successful upload and reconnecting
    pub post_flash_delay: u64,
    /// Root for staged firmware; defaults to the local data directory
    pub work_dir: Option<PathBuf>,
    pub last_flash_options: LastFlashOptions,
}

/// arduino-cli backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArduinoSettings {
    pub cli_path: Option<PathBuf>,
    /// Sketch file that marks the project root inside an uploaded archive
    pub sketch_ino: String,
}

/// PlatformIO backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformIoSettings {
    pub cli_path: Option<PathBuf>,
}

/// Options of the last flash request, per backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastFlashOptions {
    pub arduino: Option<FlashOptions>,
    pub platformio: Option<FlashOptions>,
}

impl LastFlashOptions {
    pub fn get(&self, platform: PlatformType) -> Option<&FlashOptions> {
        match platform {
            PlatformType::Arduino => self.arduino.as_ref(),
            PlatformType::PlatformIo => self.platformio.as_ref(),
        }
    }

    pub fn set(&mut self, platform: PlatformType, options: FlashOptions) {
        match platform {
            PlatformType::Arduino => self.arduino = Some(options),
            PlatformType::PlatformIo => self.platformio = Some(options),
        }
    }
}

impl Default for FlasherSettings {
    fn default() -> Self {
        Self {
            platform: PlatformType::Arduino,
            arduino: ArduinoSettings::default(),
            platformio: PlatformIoSettings::default(),
            max_upload_size: 20 * 1024 * 1024,
            pre_flash_script: None,
            pre_flash_delay: 0,
            post_flash_script: None,
            post_flash_delay: 0,
            work_dir: None,
            last_flash_options: LastFlashOptions::default(),
        }
    }
}

impl Default for ArduinoSettings {
    fn default() -> Self {
        Self {
            cli_path: None,
            sketch_ino: "Marlin.ino".to_string(),
        }
    }
}

impl FlasherSettings {
    pub fn pre_flash_delay(&self) -> Duration {
        Duration::from_secs(self.pre_flash_delay)
    }

    pub fn post_flash_delay(&self) -> Duration {
        Duration::from_secs(self.post_flash_delay)
    }

    /// Pre-flash commands, or `None` when no script is configured
    pub fn pre_flash_commands(&self) -> Option<Vec<String>> {
        script_commands(self.pre_flash_script.as_deref())
    }

    /// Post-flash commands, or `None` when no script is configured
    pub fn post_flash_commands(&self) -> Option<Vec<String>> {
        script_commands(self.post_flash_script.as_deref())
    }

    /// Working directory for one backend's staged firmware
    pub fn work_root(&self, platform: PlatformType) -> PathBuf {
        let base = self.work_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(crate::APP_NAME)
        });
        base.join(platform.as_str())
    }
}

/// Split a script into printer commands, skipping blank lines
fn script_commands(script: Option<&str>) -> Option<Vec<String>> {
    let commands: Vec<String> = script?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if commands.is_empty() { None } else { Some(commands) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_commands_skip_blank_lines() {
        let settings = FlasherSettings {
            pre_flash_script: Some("M117 Flashing\n\n  M81  \r\n".to_string()),
            post_flash_script: Some("   \n".to_string()),
            ..Default::default()
        };
        assert_eq!(
            settings.pre_flash_commands(),
            Some(vec!["M117 Flashing".to_string(), "M81".to_string()])
        );
        assert_eq!(settings.post_flash_commands(), None);
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("PlatformIO".parse::<PlatformType>(), Ok(PlatformType::PlatformIo));
        assert_eq!("arduino".parse::<PlatformType>(), Ok(PlatformType::Arduino));
        assert!("make".parse::<PlatformType>().is_err());
    }

    #[test]
    fn test_work_root_is_per_platform() {
        let settings = FlasherSettings {
            work_dir: Some(PathBuf::from("/tmp/flasher")),
            ..Default::default()
        };
        assert_eq!(
            settings.work_root(PlatformType::PlatformIo),
            PathBuf::from("/tmp/flasher/platformio")
        );
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let settings: FlasherSettings = ron::from_str("(platform: platformio)").unwrap();
        assert_eq!(settings.platform, PlatformType::PlatformIo);
        assert_eq!(settings.arduino.sketch_ino, "Marlin.ino");
        assert_eq!(settings.max_upload_size, 20 * 1024 * 1024);
    }
}
