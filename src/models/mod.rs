//! Data models shared by the flasher components

pub mod artifact;
pub mod device;
pub mod events;
pub mod flash;
pub mod setup;

// Re-export commonly used types
pub use artifact::*;
pub use device::*;
pub use events::*;
pub use flash::*;
pub use setup::*;
