//! Marlin Flasher - compile and flash printer firmware from a print host
//!
//! Stages Marlin source archives or precompiled Intel HEX images, builds
//! them with arduino-cli or PlatformIO, and uploads them over the serial
//! port the print host normally owns, handing the port back afterwards.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod device;
pub mod errors;
pub mod models;
pub mod services;
pub mod toolchain;
pub mod utils;

// Re-export commonly used types
pub use errors::*;
pub use models::*;
pub use services::{FlashOrchestrator, MarlinFlasher};

/// Marlin Flasher version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name, also used for config and data directories
pub const APP_NAME: &str = "marlin-flasher";
