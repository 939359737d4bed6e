//! Flash services shared by the CLI and embedding hosts

pub mod flasher;
pub mod orchestrator;
pub mod publisher;

pub use flasher::MarlinFlasher;
pub use orchestrator::FlashOrchestrator;
pub use publisher::{BroadcastPublisher, EventPublisher, PublishedMessage};
