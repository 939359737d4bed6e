//! Custom error types for the flasher

use std::fmt;

/// Main error type for flasher operations
#[derive(Debug)]
pub enum FlasherError {
    /// Toolchain unset, unsupported or otherwise misconfigured
    Config(String),
    /// Bad input file or missing request field
    Validation(String),
    /// The external toolchain exited with a non-zero status
    Toolchain {
        /// Human readable command line that failed
        command: String,
        /// Captured stderr (or stdout when stderr was empty)
        output: String,
    },
    /// Device not ready, not connected or not reachable over serial
    Device(String),
    /// Nothing staged for flashing
    NoFirmware,
    /// A flash task is already running on this backend
    FlashInProgress,
    /// Operation not offered by the active backend
    Unsupported(String),
    /// Download errors
    Network(String),
    /// General I/O errors
    Io(std::io::Error),
    /// Serialization errors
    Serialization(String),
}

impl fmt::Display for FlasherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlasherError::Config(msg) => write!(f, "Configuration error: {}", msg),
            FlasherError::Validation(msg) => write!(f, "{}", msg),
            FlasherError::Toolchain { command, output } => {
                if output.is_empty() {
                    write!(f, "{} failed", command)
                } else {
                    write!(f, "{} failed:\n{}", command, output)
                }
            }
            FlasherError::Device(msg) => write!(f, "{}", msg),
            FlasherError::NoFirmware => write!(
                f,
                "No firmware uploaded or it was reset by a previous flash."
            ),
            FlasherError::FlashInProgress => write!(f, "A flash is already in progress."),
            FlasherError::Unsupported(msg) => write!(f, "{}", msg),
            FlasherError::Network(msg) => write!(f, "Download error: {}", msg),
            FlasherError::Io(err) => write!(f, "I/O error: {}", err),
            FlasherError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for FlasherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlasherError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FlasherError {
    fn from(err: std::io::Error) -> Self {
        FlasherError::Io(err)
    }
}

impl From<serde_json::Error> for FlasherError {
    fn from(err: serde_json::Error) -> Self {
        FlasherError::Serialization(err.to_string())
    }
}

impl From<ron::Error> for FlasherError {
    fn from(err: ron::Error) -> Self {
        FlasherError::Serialization(err.to_string())
    }
}

impl From<ron::error::SpannedError> for FlasherError {
    fn from(err: ron::error::SpannedError) -> Self {
        FlasherError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for FlasherError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => FlasherError::Io(io),
            other => FlasherError::Validation(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for FlasherError {
    fn from(err: reqwest::Error) -> Self {
        FlasherError::Network(err.to_string())
    }
}

impl FlasherError {
    /// Message shown for files that are neither an archive nor a firmware image
    pub const INVALID_FILE_TYPE: &'static str = "Invalid file type.";
    /// Message shown when an archive does not contain the entry-point file
    pub const NO_VALID_PROJECT: &'static str = "No valid project found";
    /// Message shown when the printer is busy or offline
    pub const DEVICE_NOT_READY: &'static str = "Device not ready.";
    /// Message shown when the printer is connected through something other than a serial port
    pub const NOT_SERIAL: &'static str = "Device not connected via serial.";

    /// Whether this error was raised by a failed toolchain invocation
    pub fn is_toolchain(&self) -> bool {
        matches!(self, FlasherError::Toolchain { .. })
    }

    /// Text to attach to a failed flash status as `error_output`
    pub fn captured_output(&self) -> Option<String> {
        match self {
            FlasherError::Toolchain { output, .. } if !output.is_empty() => Some(output.clone()),
            _ => None,
        }
    }
}

/// Result type alias for flasher operations
pub type Result<T> = std::result::Result<T, FlasherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_firmware_message() {
        assert_eq!(
            FlasherError::NoFirmware.to_string(),
            "No firmware uploaded or it was reset by a previous flash."
        );
    }

    #[test]
    fn test_toolchain_error_exposes_output() {
        let err = FlasherError::Toolchain {
            command: "arduino-cli compile".to_string(),
            output: "sketch.ino:1: error".to_string(),
        };
        assert!(err.is_toolchain());
        assert_eq!(err.captured_output().as_deref(), Some("sketch.ino:1: error"));
        assert!(err.to_string().starts_with("arduino-cli compile failed"));

        let silent = FlasherError::Toolchain {
            command: "pio run".to_string(),
            output: String::new(),
        };
        assert_eq!(silent.captured_output(), None);
        assert_eq!(silent.to_string(), "pio run failed");
    }

    #[test]
    fn test_io_error_source() {
        let err: FlasherError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
