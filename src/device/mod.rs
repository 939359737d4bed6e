//! Printer connection collaborators
//!
//! The print host owns the serial link to the controller board. The flasher
//! only ever talks to it through [`DeviceController`], and only in the order
//! [`SerialHandoff`] defines.

pub mod handoff;
pub mod serial;

pub use handoff::SerialHandoff;
pub use serial::SerialPortDevice;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{ConnectionInfo, ConnectionParams, TransportKind};

/// Connection manager of the print host
#[async_trait]
pub trait DeviceController: Send + Sync {
    /// Connected and not busy printing
    async fn is_ready(&self) -> bool;

    /// Transport the current connection runs over
    async fn transport(&self) -> TransportKind;

    /// Current connection parameters
    async fn current_connection(&self) -> ConnectionInfo;

    async fn disconnect(&self) -> Result<()>;

    /// Connect with the given parameters; completion may be signalled later
    async fn connect(&self, params: &ConnectionParams) -> Result<()>;

    /// Queue printer commands (G-code) for sending
    async fn send_commands(&self, commands: &[String]) -> Result<()>;
}
