//! Taking the serial port away from the print host and giving it back

use log::{info, warn};
use std::sync::Arc;

use super::DeviceController;
use crate::errors::{FlasherError, Result};
use crate::models::ConnectionParams;

/// Thin accessors over the host's connection manager
#[derive(Clone)]
pub struct SerialHandoff {
    device: Arc<dyn DeviceController>,
}

impl SerialHandoff {
    pub fn new(device: Arc<dyn DeviceController>) -> Self {
        Self { device }
    }

    pub async fn is_serial_connection(&self) -> bool {
        self.device.transport().await.is_serial()
    }

    pub async fn current_port(&self) -> Option<String> {
        self.device.current_connection().await.port
    }

    /// Capture port, baud rate and profile, then disconnect.
    ///
    /// Nothing is disconnected when no port can be captured.
    pub async fn disconnect_and_capture(&self) -> Result<ConnectionParams> {
        let connection = self.device.current_connection().await;
        let port = connection
            .port
            .ok_or_else(|| FlasherError::Device(FlasherError::NOT_SERIAL.to_string()))?;

        let params = ConnectionParams {
            port,
            baudrate: connection.baudrate,
            profile: connection.profile,
        };

        info!("🔌 Disconnecting printer from {}", params.port);
        self.device.disconnect().await?;
        Ok(params)
    }

    /// Reconnect with previously captured parameters
    pub async fn reconnect(&self, params: &ConnectionParams) -> Result<()> {
        info!(
            "🔌 Reconnecting printer on {} ({})",
            params.port,
            params
                .baudrate
                .map(|b| b.to_string())
                .unwrap_or_else(|| "auto".to_string())
        );
        let result = self.device.connect(params).await;
        if let Err(e) = &result {
            warn!("Reconnect on {} failed: {}", params.port, e);
        }
        result
    }
}
