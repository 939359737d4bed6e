//! Settings persistence

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::settings::{FlasherSettings, PlatformType};
use crate::errors::Result;
use crate::models::FlashOptions;

/// Source of flasher settings and sink for the last flash options
pub trait SettingsStore: Send + Sync {
    /// Current settings snapshot
    fn settings(&self) -> FlasherSettings;

    /// Remember the options of the latest flash request for `platform`
    fn save_last_flash_options(&self, platform: PlatformType, options: &FlashOptions)
    -> Result<()>;
}

/// Settings stored as RON on disk
pub struct FileSettingsStore {
    path: PathBuf,
    current: RwLock<FlasherSettings>,
}

impl FileSettingsStore {
    /// Load settings from `path`, falling back to defaults if it is missing or unreadable
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match Self::read(&path) {
            Ok(settings) => settings,
            Err(e) => {
                if path.exists() {
                    warn!(
                        "Failed to load settings from {}: {}, using defaults",
                        path.display(),
                        e
                    );
                } else {
                    debug!("No settings at {}, using defaults", path.display());
                }
                FlasherSettings::default()
            }
        };
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// `<config dir>/marlin-flasher/settings.ron`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("settings.ron")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace and persist the whole settings document
    pub fn update(&self, settings: FlasherSettings) -> Result<()> {
        Self::write(&self.path, &settings)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings;
        Ok(())
    }

    fn read(path: &Path) -> Result<FlasherSettings> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    fn write(path: &Path, settings: &FlasherSettings) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(settings, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, ron_string)?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn settings(&self) -> FlasherSettings {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn save_last_flash_options(
        &self,
        platform: PlatformType,
        options: &FlashOptions,
    ) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = current.clone();
        updated.last_flash_options.set(platform, options.clone());
        Self::write(&self.path, &updated)?;
        *current = updated;
        Ok(())
    }
}

/// Settings held only in memory, for embedding hosts that persist elsewhere
#[derive(Default)]
pub struct MemorySettingsStore {
    current: RwLock<FlasherSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: FlasherSettings) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn settings(&self) -> FlasherSettings {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn save_last_flash_options(
        &self,
        platform: PlatformType,
        options: &FlashOptions,
    ) -> Result<()> {
        self.current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .last_flash_options
            .set(platform, options.clone());
        Ok(())
    }
}
