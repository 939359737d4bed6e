//! Flash orchestration
//!
//! Owns the staged firmware and the status of the last flash attempt, and
//! runs the compile → hand-off → upload → reconnect sequence in a background
//! task. Only one such task runs at a time.

use chrono::Local;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::publisher::EventPublisher;
use crate::artifact::FirmwareResolver;
use crate::config::{FlasherSettings, PlatformType, SettingsStore};
use crate::device::{DeviceController, SerialHandoff};
use crate::errors::{FlasherError, Result};
use crate::models::{
    FirmwareArtifact, FlashOptions, FlashStatus, FlashTicket, FlasherEvent, SetupDiagnostic,
};
use crate::toolchain::{LineSink, Toolchain};

#[derive(Debug, Default)]
struct FlashState {
    artifact: Option<FirmwareArtifact>,
    status: FlashStatus,
    post_flash_pending: bool,
}

type SharedState = Arc<RwLock<FlashState>>;

/// Background flash task; `done` flips to true once the terminal status is set
struct FlashTask {
    handle: JoinHandle<()>,
    done: watch::Receiver<bool>,
}

impl FlashTask {
    fn is_running(&self) -> bool {
        !*self.done.borrow() && !self.handle.is_finished()
    }
}

/// Coordinates staging, compiling and uploading firmware for one backend
pub struct FlashOrchestrator {
    toolchain: Arc<dyn Toolchain>,
    resolver: FirmwareResolver,
    device: Arc<dyn DeviceController>,
    handoff: SerialHandoff,
    publisher: Arc<dyn EventPublisher>,
    settings: Arc<dyn SettingsStore>,
    state: SharedState,
    flash_task: Mutex<Option<FlashTask>>,
}

impl FlashOrchestrator {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        device: Arc<dyn DeviceController>,
        publisher: Arc<dyn EventPublisher>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let resolver = FirmwareResolver::for_toolchain(&settings.settings(), toolchain.as_ref());
        Self {
            toolchain,
            resolver,
            handoff: SerialHandoff::new(device.clone()),
            device,
            publisher,
            settings,
            state: Arc::new(RwLock::new(FlashState::default())),
            flash_task: Mutex::new(None),
        }
    }

    pub fn platform(&self) -> PlatformType {
        self.toolchain.platform()
    }

    pub fn toolchain(&self) -> &Arc<dyn Toolchain> {
        &self.toolchain
    }

    /// Directory staged firmware lives in
    pub fn firmware_dir(&self) -> PathBuf {
        self.resolver.firmware_dir()
    }

    /// Configuration problems of the active toolchain; empty when usable
    pub async fn check_setup_errors(&self) -> Vec<SetupDiagnostic> {
        self.toolchain.check_setup().await
    }

    /// Stage an uploaded file as the current firmware.
    ///
    /// Any previously staged firmware is discarded first, even if the new
    /// file turns out to be invalid.
    pub async fn upload(&self, path: &Path) -> Result<FirmwareArtifact> {
        let _task = self.ensure_idle().await?;
        self.clear_artifact().await;

        let resolver = self.resolver.clone();
        let path = path.to_path_buf();
        let artifact = tokio::task::spawn_blocking(move || resolver.resolve(&path))
            .await
            .map_err(|e| FlasherError::Io(std::io::Error::other(e)))??;

        self.stage_artifact(artifact.clone()).await;
        Ok(artifact)
    }

    /// Download a file over http(s) and stage it as the current firmware
    pub async fn download(&self, url: &str) -> Result<FirmwareArtifact> {
        let _task = self.ensure_idle().await?;
        self.clear_artifact().await;

        let artifact = self.resolver.download(url).await?;
        self.stage_artifact(artifact.clone()).await;
        Ok(artifact)
    }

    /// Currently staged firmware, if any
    pub async fn firmware_info(&self) -> Option<FirmwareArtifact> {
        self.state.read().await.artifact.clone()
    }

    pub async fn core_search(&self, query: &str) -> Result<Value> {
        self.toolchain.core_search(query).await
    }

    pub async fn lib_search(&self, query: &str) -> Result<Value> {
        self.toolchain.lib_search(query).await
    }

    pub async fn core_install(&self, core: &str) -> Result<Value> {
        self.toolchain.core_install(core).await
    }

    pub async fn lib_install(&self, lib: &str) -> Result<Value> {
        self.toolchain.lib_install(lib).await
    }

    pub async fn core_uninstall(&self, core: &str) -> Result<Value> {
        self.toolchain.core_uninstall(core).await
    }

    pub async fn lib_uninstall(&self, lib: &str) -> Result<Value> {
        self.toolchain.lib_uninstall(lib).await
    }

    pub async fn board_listall(&self) -> Result<Value> {
        self.toolchain.board_listall().await
    }

    pub async fn board_details(&self, fqbn: &str) -> Result<Value> {
        self.toolchain.board_details(fqbn).await
    }

    /// Start flashing the staged firmware.
    ///
    /// Checks run synchronously and leave the status untouched on failure;
    /// the actual work happens in a background task whose progress is
    /// published on the `flash_status` topic.
    pub async fn flash(&self, options: FlashOptions) -> Result<FlashTicket> {
        let mut task = self.ensure_idle().await?;

        let artifact = self
            .state
            .read()
            .await
            .artifact
            .clone()
            .ok_or(FlasherError::NoFirmware)?;

        if !self.device.is_ready().await {
            return Err(FlasherError::Device(
                FlasherError::DEVICE_NOT_READY.to_string(),
            ));
        }

        self.toolchain.validate_flash_options(&options)?;

        if let Err(e) = self
            .settings
            .save_last_flash_options(self.platform(), &options)
        {
            warn!("Failed to remember flash options: {}", e);
        }

        // Reset without publishing; the job publishes its first step itself
        self.state.write().await.status = FlashStatus::idle();

        let ticket = FlashTicket {
            id: Uuid::new_v4().to_string(),
            kind: artifact.kind,
            started_at: Local::now(),
        };
        info!(
            "🔥 Flash {} started ({:?}, {})",
            ticket.id,
            artifact.kind,
            artifact.location.display()
        );

        let (done_tx, done) = watch::channel(false);
        let job = FlashJob {
            toolchain: self.toolchain.clone(),
            handoff: self.handoff.clone(),
            device: self.device.clone(),
            publisher: self.publisher.clone(),
            settings: self.settings.settings(),
            state: self.state.clone(),
            done: done_tx,
        };
        *task = Some(FlashTask {
            handle: tokio::spawn(job.run(artifact, options)),
            done,
        });

        Ok(ticket)
    }

    /// Snapshot of the current or last flash attempt
    pub async fn flash_status(&self) -> FlashStatus {
        self.state.read().await.status.clone()
    }

    /// Re-send the current status, e.g. to a freshly connected client
    pub async fn publish_current_status(&self) {
        let status = self.flash_status().await;
        self.publisher.emit(&FlasherEvent::FlashStatus(status));
    }

    /// Options of the last accepted flash request for the active backend
    pub fn last_flash_options(&self) -> Option<FlashOptions> {
        self.settings
            .settings()
            .last_flash_options
            .get(self.platform())
            .cloned()
    }

    /// True while a flash task is running
    pub async fn is_flashing(&self) -> bool {
        self.flash_task
            .lock()
            .await
            .as_ref()
            .is_some_and(FlashTask::is_running)
    }

    /// Wait for the running flash task, if any, and return the final status.
    ///
    /// The task stays registered while waiting, so the guard keeps refusing
    /// new work until the flash has really finished.
    pub async fn wait_for_flash(&self) -> FlashStatus {
        let done = self
            .flash_task
            .lock()
            .await
            .as_ref()
            .map(|task| task.done.clone());
        if let Some(mut done) = done {
            if done.wait_for(|finished| *finished).await.is_err() {
                error!("Flash task aborted before reporting a final status");
            }
        }
        self.flash_status().await
    }

    /// True between a successful flash and the connected notification that
    /// sends the post-flash script
    pub async fn post_flash_pending(&self) -> bool {
        self.state.read().await.post_flash_pending
    }

    /// Carry a pending post-flash script over from a replaced orchestrator
    pub(crate) async fn arm_post_flash(&self) {
        self.state.write().await.post_flash_pending = true;
    }

    /// React to the printer reporting a (re)established connection.
    ///
    /// Sends the post-flash script once after a successful flash. Returns
    /// whether anything was sent.
    pub async fn handle_connected_event(&self) -> Result<bool> {
        let pending = std::mem::take(&mut self.state.write().await.post_flash_pending);
        if !pending {
            return Ok(false);
        }

        let Some(commands) = self.settings.settings().post_flash_commands() else {
            return Ok(false);
        };

        info!("Sending post-flash script ({} commands)", commands.len());
        self.device.send_commands(&commands).await?;
        self.publisher
            .emit(&FlasherEvent::PostFlashScriptSent(commands.len()));
        Ok(true)
    }

    async fn ensure_idle(&self) -> Result<MutexGuard<'_, Option<FlashTask>>> {
        let task = self.flash_task.lock().await;
        if task.as_ref().is_some_and(FlashTask::is_running) {
            return Err(FlasherError::FlashInProgress);
        }
        Ok(task)
    }

    async fn clear_artifact(&self) {
        let previous = self.state.write().await.artifact.take();
        if previous.is_some() {
            self.publisher.emit(&FlasherEvent::FirmwareCleared);
        }
    }

    async fn stage_artifact(&self, artifact: FirmwareArtifact) {
        info!(
            "📦 Firmware staged: {:?} at {}",
            artifact.kind,
            artifact.location.display()
        );
        self.state.write().await.artifact = Some(artifact.clone());
        self.publisher.emit(&FlasherEvent::FirmwareStaged(artifact));
    }
}

/// Everything the background flash task needs, detached from the orchestrator
struct FlashJob {
    toolchain: Arc<dyn Toolchain>,
    handoff: SerialHandoff,
    device: Arc<dyn DeviceController>,
    publisher: Arc<dyn EventPublisher>,
    settings: FlasherSettings,
    state: SharedState,
    done: watch::Sender<bool>,
}

impl FlashJob {
    async fn run(self, artifact: FirmwareArtifact, options: FlashOptions) {
        let (sink, forwarder) = spawn_output_forwarder(self.publisher.clone());
        let outcome = self.execute(&artifact, &options, &sink).await;

        // Flush toolchain output before the terminal status goes out
        drop(sink);
        if let Err(e) = forwarder.await {
            warn!("Output forwarder stopped: {}", e);
        }

        if outcome.success {
            info!("✅ Flash completed successfully");
        } else {
            error!(
                "❌ Flash failed: {}",
                outcome.message.as_deref().unwrap_or("unknown error")
            );
        }
        self.set_status(outcome).await;
        self.done.send_replace(true);
    }

    /// Run every step; returns the terminal status
    async fn execute(
        &self,
        artifact: &FirmwareArtifact,
        options: &FlashOptions,
        sink: &LineSink,
    ) -> FlashStatus {
        let upload_progress = if artifact.kind.needs_compile() {
            self.set_status(FlashStatus::compiling()).await;
            info!("🔨 Compiling {}", artifact.location.display());
            if let Err(e) = self.toolchain.compile(artifact, options, Some(sink)).await {
                return failure("Compilation failed", &e);
            }
            50
        } else {
            0
        };
        self.set_status(FlashStatus::uploading(upload_progress)).await;

        if !self.handoff.is_serial_connection().await {
            return FlashStatus::failed(FlasherError::NOT_SERIAL, None);
        }

        if let Some(commands) = self.settings.pre_flash_commands() {
            info!("Sending pre-flash script ({} commands)", commands.len());
            if let Err(e) = self.device.send_commands(&commands).await {
                warn!("Pre-flash script failed: {}", e);
            }
            tokio::time::sleep(self.settings.pre_flash_delay()).await;
        }

        let params = match self.handoff.disconnect_and_capture().await {
            Ok(params) => params,
            Err(e) => return failure("Could not take over the serial port", &e),
        };

        info!("📤 Uploading to {}", params.port);
        if let Err(e) = self
            .toolchain
            .upload(artifact, options, &params.port, Some(sink))
            .await
        {
            let _ = self.handoff.reconnect(&params).await;
            return failure("Upload failed", &e);
        }

        tokio::time::sleep(self.settings.post_flash_delay()).await;

        // Armed before reconnecting so a fast connected event is not missed
        self.state.write().await.post_flash_pending = true;
        if let Err(e) = self.handoff.reconnect(&params).await {
            warn!("Printer did not reconnect after flashing: {}", e);
        }

        self.state.write().await.artifact = None;
        self.publisher.emit(&FlasherEvent::FirmwareCleared);

        FlashStatus::done()
    }

    async fn set_status(&self, status: FlashStatus) {
        self.state.write().await.status = status.clone();
        self.publisher.emit(&FlasherEvent::FlashStatus(status));
    }
}

fn failure(message: &str, error: &FlasherError) -> FlashStatus {
    let error_output = error
        .captured_output()
        .unwrap_or_else(|| error.to_string());
    FlashStatus::failed(message, Some(error_output))
}

/// Forward toolchain lines to the log and the publisher as they arrive
fn spawn_output_forwarder(publisher: Arc<dyn EventPublisher>) -> (LineSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some((stream, line)) = rx.recv().await {
            debug!("[{:?}] {}", stream, line);
            publisher.emit(&FlasherEvent::ToolchainOutput(stream, line));
        }
    });
    (tx, handle)
}
