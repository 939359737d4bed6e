//! Error taxonomy shared by every flasher component

pub mod types;

pub use types::*;
