//! Firmware artifact detection, staging and download

pub mod ihex;
pub mod resolver;

pub use resolver::{FirmwareResolver, SourceFormat, parse_download_url, read_metadata};
