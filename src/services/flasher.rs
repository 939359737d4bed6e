//! Settings-driven entry point
//!
//! Picks the toolchain backend from the stored settings and swaps the whole
//! orchestrator when the settings change.

use log::info;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::orchestrator::FlashOrchestrator;
use super::publisher::EventPublisher;
use crate::config::{PlatformType, SettingsStore};
use crate::device::DeviceController;
use crate::errors::{FlasherError, Result};
use crate::toolchain::build_toolchain;

pub struct MarlinFlasher {
    device: Arc<dyn DeviceController>,
    publisher: Arc<dyn EventPublisher>,
    settings: Arc<dyn SettingsStore>,
    active: RwLock<Arc<FlashOrchestrator>>,
}

impl MarlinFlasher {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        device: Arc<dyn DeviceController>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let active = Self::build(&settings, &device, &publisher);
        Self {
            device,
            publisher,
            settings,
            active: RwLock::new(Arc::new(active)),
        }
    }

    fn build(
        settings: &Arc<dyn SettingsStore>,
        device: &Arc<dyn DeviceController>,
        publisher: &Arc<dyn EventPublisher>,
    ) -> FlashOrchestrator {
        let toolchain = build_toolchain(&settings.settings());
        FlashOrchestrator::new(
            toolchain,
            device.clone(),
            publisher.clone(),
            settings.clone(),
        )
    }

    /// Orchestrator for the currently configured backend
    pub async fn orchestrator(&self) -> Arc<FlashOrchestrator> {
        self.active.read().await.clone()
    }

    pub async fn platform(&self) -> PlatformType {
        self.active.read().await.platform()
    }

    /// Rebuild the backend from the settings store.
    ///
    /// Refused while a flash is running. Staged firmware belongs to the old
    /// backend and is dropped, but a post-flash script still waiting for the
    /// printer to reconnect carries over. Callers must fetch the orchestrator
    /// again afterwards: a previously returned handle keeps its own guard.
    pub async fn reload(&self) -> Result<()> {
        let mut active = self.active.write().await;
        if active.is_flashing().await {
            return Err(FlasherError::FlashInProgress);
        }
        let replacement = Self::build(&self.settings, &self.device, &self.publisher);
        if active.post_flash_pending().await {
            replacement.arm_post_flash().await;
        }
        *active = Arc::new(replacement);
        info!("🔄 Settings reloaded, using {} toolchain", active.platform());
        Ok(())
    }
}
