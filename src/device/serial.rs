//! Printer connection over a plain serial port
//!
//! Stands in for a print host when the flasher runs on its own: it keeps the
//! port open between flashes and hands it over like a host would.

use async_trait::async_trait;
use log::{debug, info};
use serialport::SerialPort;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::DeviceController;
use crate::errors::{FlasherError, Result};
use crate::models::{ConnectionInfo, ConnectionParams, TransportKind};

/// Default printer baud rate when none was captured
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

struct OpenPort {
    port: Box<dyn SerialPort>,
    params: ConnectionParams,
}

type SharedPort = Arc<Mutex<Option<OpenPort>>>;

/// [`DeviceController`] backed by the `serialport` crate
///
/// Port I/O is blocking and runs on the blocking thread pool.
pub struct SerialPortDevice {
    open: SharedPort,
}

impl Default for SerialPortDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPortDevice {
    pub fn new() -> Self {
        Self {
            open: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(open: &SharedPort) -> MutexGuard<'_, Option<OpenPort>> {
        open.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run blocking port work off the async runtime
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SharedPort) -> Result<T> + Send + 'static,
    {
        let open = self.open.clone();
        tokio::task::spawn_blocking(move || work(&open))
            .await
            .map_err(|e| FlasherError::Io(std::io::Error::other(e)))?
    }
}

/// Open `params.port`, replacing any connection already held
fn open_port(open: &SharedPort, params: ConnectionParams) -> Result<()> {
    let baudrate = params.baudrate.unwrap_or(DEFAULT_BAUD_RATE);
    let port = serialport::new(&params.port, baudrate)
        .timeout(Duration::from_millis(500))
        .open()
        .map_err(|e| FlasherError::Device(format!("Failed to open {}: {}", params.port, e)))?;

    info!("✅ Connected to {} at {} baud", params.port, baudrate);
    *SerialPortDevice::lock(open) = Some(OpenPort { port, params });
    Ok(())
}

fn write_commands(open: &SharedPort, commands: &[String]) -> Result<()> {
    let mut guard = SerialPortDevice::lock(open);
    let open = guard
        .as_mut()
        .ok_or_else(|| FlasherError::Device(FlasherError::DEVICE_NOT_READY.to_string()))?;

    for command in commands {
        debug!("→ {}", command);
        open.port.write_all(command.as_bytes())?;
        open.port.write_all(b"\n")?;
    }
    open.port.flush()?;
    Ok(())
}

#[async_trait]
impl DeviceController for SerialPortDevice {
    async fn is_ready(&self) -> bool {
        Self::lock(&self.open).is_some()
    }

    async fn transport(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn current_connection(&self) -> ConnectionInfo {
        match Self::lock(&self.open).as_ref() {
            Some(open) => ConnectionInfo {
                state: "Operational".to_string(),
                port: Some(open.params.port.clone()),
                baudrate: Some(open.params.baudrate.unwrap_or(DEFAULT_BAUD_RATE)),
                profile: open.params.profile.clone(),
            },
            None => ConnectionInfo {
                state: "Closed".to_string(),
                ..Default::default()
            },
        }
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(open) = Self::lock(&self.open).take() {
            info!("Closed {}", open.params.port);
        }
        Ok(())
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<()> {
        let params = params.clone();
        self.blocking(move |open| open_port(open, params)).await
    }

    async fn send_commands(&self, commands: &[String]) -> Result<()> {
        let commands = commands.to_vec();
        self.blocking(move |open| write_commands(open, &commands))
            .await
    }
}
