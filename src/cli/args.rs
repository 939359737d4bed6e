//! Command line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::device::serial::DEFAULT_BAUD_RATE;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "marlin-flasher")]
#[command(about = "🔥 Compile and flash Marlin firmware through arduino-cli or PlatformIO")]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease logging verbosity (only errors)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Log one JSON object per line instead of plain text
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Append JSON logs to this file instead of stdout (with --log-json)
    #[arg(long, global = true, value_name = "FILE", requires = "log_json")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Validate the configured toolchain
    Check,
    /// Stage firmware and flash it to the printer
    Flash {
        /// Zip archive or Intel HEX image to flash
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,
        /// Download the firmware from this http(s) URL instead
        #[arg(long)]
        url: Option<String>,
        /// Serial port the printer is connected to (e.g., /dev/ttyUSB0, COM3)
        #[arg(short, long)]
        port: String,
        /// Printer baud rate
        #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
        /// Toolchain option, e.g. -o fqbn=arduino:avr:mega -o cpu=atmega2560
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        options: Vec<(String, String)>,
    },
    /// Stage a firmware file and show what was detected
    Info {
        /// Zip archive or Intel HEX image
        file: PathBuf,
    },
    /// Manage board cores
    Core {
        #[command(subcommand)]
        action: PackageAction,
    },
    /// Manage libraries
    Lib {
        #[command(subcommand)]
        action: PackageAction,
    },
    /// Query known boards
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },
    /// List serial ports a printer may be connected to
    Ports,
    /// Show the options of the last accepted flash
    LastOptions,
}

#[derive(Subcommand, Clone)]
pub enum PackageAction {
    Search { query: String },
    Install { id: String },
    Uninstall { id: String },
}

#[derive(Subcommand, Clone)]
pub enum BoardAction {
    /// List all installed boards
    List,
    /// Show details of one board
    Details { fqbn: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("fqbn=arduino:avr:mega").unwrap(),
            ("fqbn".to_string(), "arduino:avr:mega".to_string())
        );
        assert_eq!(
            parse_key_val("flags=a=b").unwrap(),
            ("flags".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_flash_requires_a_source() {
        assert!(Cli::try_parse_from(["marlin-flasher", "flash", "--port", "/dev/ttyUSB0"]).is_err());
        assert!(
            Cli::try_parse_from([
                "marlin-flasher",
                "flash",
                "--port",
                "/dev/ttyUSB0",
                "--file",
                "a.zip",
                "--url",
                "http://x/a.zip"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_flash_arguments() {
        let cli = Cli::try_parse_from([
            "marlin-flasher",
            "-v",
            "flash",
            "--file",
            "marlin.zip",
            "-p",
            "/dev/ttyACM0",
            "-o",
            "fqbn=arduino:avr:mega",
            "-o",
            "cpu=atmega2560",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Flash {
                file,
                url,
                port,
                baud,
                options,
            } => {
                assert_eq!(file, Some(PathBuf::from("marlin.zip")));
                assert_eq!(url, None);
                assert_eq!(port, "/dev/ttyACM0");
                assert_eq!(baud, DEFAULT_BAUD_RATE);
                assert_eq!(options.len(), 2);
            }
            _ => panic!("expected flash command"),
        }
    }
}
