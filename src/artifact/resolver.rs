//! Turns an uploaded or downloaded file into a staged firmware

use futures_util::StreamExt;
use log::{debug, info, warn};
use regex::Regex;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;
use walkdir::WalkDir;

use super::ihex;
use crate::config::FlasherSettings;
use crate::errors::{FlasherError, Result};
use crate::models::{FirmwareArtifact, FirmwareMetadata};
use crate::toolchain::Toolchain;

const VERSION_MARKER: &str = "SHORT_BUILD_VERSION";
const AUTHOR_MARKER: &str = "STRING_CONFIG_H_AUTHOR";

/// Container format detected by [`FirmwareResolver::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Zip archive holding a project
    Archive,
    /// Intel HEX firmware image
    IntelHex,
}

/// Validates, extracts and stores firmware files under a per-backend working directory
#[derive(Debug, Clone)]
pub struct FirmwareResolver {
    work_root: PathBuf,
    entry_point: String,
    accepts_precompiled: bool,
    max_upload_size: u64,
}

impl FirmwareResolver {
    /// File name precompiled images are stored under
    pub const BINARY_NAME: &'static str = "firmware.hex";

    pub fn new(
        work_root: impl Into<PathBuf>,
        entry_point: impl Into<String>,
        accepts_precompiled: bool,
        max_upload_size: u64,
    ) -> Self {
        Self {
            work_root: work_root.into(),
            entry_point: entry_point.into(),
            accepts_precompiled,
            max_upload_size,
        }
    }

    /// Resolver matching `toolchain`'s entry point and accepted formats
    pub fn for_toolchain(settings: &FlasherSettings, toolchain: &dyn Toolchain) -> Self {
        Self::new(
            settings.work_root(toolchain.platform()),
            toolchain.entry_point(),
            toolchain.accepts_precompiled(),
            settings.max_upload_size,
        )
    }

    /// Directory the current firmware is extracted or copied into
    pub fn firmware_dir(&self) -> PathBuf {
        self.work_root.join("firmware")
    }

    /// Sniff `path`: a zip archive, else (when accepted) an Intel HEX image
    pub fn validate(&self, path: &Path) -> Result<SourceFormat> {
        let metadata = fs::metadata(path).map_err(|e| {
            FlasherError::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(FlasherError::Validation(format!(
                "{} is not a file",
                path.display()
            )));
        }
        if metadata.len() > self.max_upload_size {
            return Err(FlasherError::Validation(format!(
                "The file exceeds the maximum upload size of {} bytes",
                self.max_upload_size
            )));
        }

        if zip::ZipArchive::new(File::open(path)?).is_ok() {
            debug!("{} is a zip archive", path.display());
            return Ok(SourceFormat::Archive);
        }

        if self.accepts_precompiled {
            match ihex::validate(&fs::read(path)?) {
                Ok(summary) => {
                    debug!(
                        "{} is an Intel HEX image ({} records, {} data bytes)",
                        path.display(),
                        summary.records,
                        summary.data_bytes
                    );
                    return Ok(SourceFormat::IntelHex);
                }
                Err(e) => debug!("{} is not an Intel HEX image: {}", path.display(), e),
            }
        }

        Err(FlasherError::Validation(
            FlasherError::INVALID_FILE_TYPE.to_string(),
        ))
    }

    /// Store an already validated file, discarding whatever was staged before
    pub fn stage(&self, path: &Path, format: SourceFormat) -> Result<FirmwareArtifact> {
        let firmware_dir = self.firmware_dir();
        reset_dir(&firmware_dir)?;

        match format {
            SourceFormat::Archive => self.stage_archive(path, &firmware_dir),
            SourceFormat::IntelHex => {
                let target = firmware_dir.join(Self::BINARY_NAME);
                fs::copy(path, &target)?;
                info!("📦 Staged precompiled firmware at {}", target.display());
                Ok(FirmwareArtifact::precompiled(target))
            }
        }
    }

    /// `validate` followed by `stage`
    pub fn resolve(&self, path: &Path) -> Result<FirmwareArtifact> {
        let format = self.validate(path)?;
        self.stage(path, format)
    }

    /// Fetch `url` into a temporary file and resolve it; the temporary file is always removed
    pub async fn download(&self, url: &str) -> Result<FirmwareArtifact> {
        let url = parse_download_url(url)?;
        tokio::fs::create_dir_all(&self.work_root).await?;

        let temp = TempDownload::new(
            self.work_root
                .join(format!("download-{}.part", Uuid::new_v4())),
        );
        info!("⬇️ Downloading firmware from {}", url);
        fetch_to(&url, temp.path(), self.max_upload_size).await?;

        let resolver = self.clone();
        let path = temp.path().to_path_buf();
        tokio::task::spawn_blocking(move || resolver.resolve(&path))
            .await
            .map_err(|e| FlasherError::Io(io::Error::other(e)))?
    }

    fn stage_archive(&self, archive_path: &Path, firmware_dir: &Path) -> Result<FirmwareArtifact> {
        extract_zip(archive_path, firmware_dir)?;

        let Some(entry) = find_entry_point(firmware_dir, &self.entry_point) else {
            warn!(
                "No {} found in {}",
                self.entry_point,
                archive_path.display()
            );
            if let Err(e) = fs::remove_dir_all(firmware_dir) {
                debug!("Failed to clean {}: {}", firmware_dir.display(), e);
            }
            return Err(FlasherError::Validation(
                FlasherError::NO_VALID_PROJECT.to_string(),
            ));
        };

        let project_dir = entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| firmware_dir.to_path_buf());
        let metadata = read_metadata(&project_dir);
        info!(
            "📦 Staged project at {} (version {}, author {})",
            project_dir.display(),
            metadata.version.as_deref().unwrap_or("unknown"),
            metadata.author.as_deref().unwrap_or("unknown")
        );
        Ok(FirmwareArtifact::source_project(project_dir, metadata))
    }
}

/// Only plain http(s) URLs may be fetched
pub fn parse_download_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| FlasherError::Validation(format!("Invalid URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(FlasherError::Validation(format!(
            "Unsupported URL scheme '{}'",
            other
        ))),
    }
}

/// Best-effort version/author scan of the files next to the entry point
pub fn read_metadata(project_dir: &Path) -> FirmwareMetadata {
    let mut metadata = FirmwareMetadata::default();
    let Ok(entries) = fs::read_dir(project_dir) else {
        return metadata;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        // Binary or unreadable files simply carry no metadata
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        if metadata.version.is_none() {
            metadata.version = define_value(VERSION_MARKER, &content);
        }
        if metadata.author.is_none() {
            metadata.author = define_value(AUTHOR_MARKER, &content);
        }
        if metadata.is_complete() {
            break;
        }
    }

    metadata
}

/// Value of `#define <name> "<value>"` in `content`
fn define_value(name: &str, content: &str) -> Option<String> {
    let pattern = format!(r#"(?m)^\s*#define\s+{}\s+"([^"]*)""#, regex::escape(name));
    Regex::new(&pattern)
        .ok()?
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Extract every entry of `archive_path` below `dest`, refusing paths that escape it
fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name() else {
            warn!("Skipping unsafe archive entry {}", file.name());
            continue;
        };
        let out_path = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&out_path)?;
            io::copy(&mut file, &mut outfile)?;
        }
    }

    debug!("Extracted {} entries into {}", archive.len(), dest.display());
    Ok(())
}

/// Shallowest file named `entry_point` below `root`
fn find_entry_point(root: &Path, entry_point: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == entry_point)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
}

async fn fetch_to(url: &Url, target: &Path, max_size: u64) -> Result<()> {
    let response = reqwest::get(url.clone()).await?.error_for_status()?;

    if let Some(length) = response.content_length() {
        if length > max_size {
            return Err(FlasherError::Validation(format!(
                "The file exceeds the maximum upload size of {} bytes",
                max_size
            )));
        }
    }

    let mut file = tokio::fs::File::create(target).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > max_size {
            return Err(FlasherError::Validation(format!(
                "The file exceeds the maximum upload size of {} bytes",
                max_size
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    debug!("Downloaded {} bytes to {}", written, target.display());
    Ok(())
}

/// Removes the downloaded file when dropped, whatever the outcome
struct TempDownload {
    path: PathBuf,
}

impl TempDownload {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_define_value() {
        let content = "// comment\n  #define SHORT_BUILD_VERSION \"2.1.2.1\"\n#define STRING_CONFIG_H_AUTHOR \"(none, default config)\"\n";
        assert_eq!(
            define_value(VERSION_MARKER, content),
            Some("2.1.2.1".to_string())
        );
        assert_eq!(
            define_value(AUTHOR_MARKER, content),
            Some("(none, default config)".to_string())
        );
        assert_eq!(define_value("DETAILED_BUILD_VERSION", content), None);
    }

    #[test]
    fn test_commented_define_is_ignored() {
        let content = "//#define SHORT_BUILD_VERSION \"old\"\n";
        assert_eq!(define_value(VERSION_MARKER, content), None);
    }

    #[test]
    fn test_read_metadata_skips_binary_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("logo.bin"), [0xffu8, 0xfe, 0x00, 0x81]).unwrap();
        fs::write(
            temp_dir.path().join("Version.h"),
            "#define SHORT_BUILD_VERSION \"bugfix-2.1.x\"\n",
        )
        .unwrap();

        let metadata = read_metadata(temp_dir.path());
        assert_eq!(metadata.version.as_deref(), Some("bugfix-2.1.x"));
        assert_eq!(metadata.author, None);
    }

    #[test]
    fn test_read_metadata_of_missing_dir_is_empty() {
        assert_eq!(
            read_metadata(Path::new("/no/such/project")),
            FirmwareMetadata::default()
        );
    }

    #[test]
    fn test_download_url_scheme() {
        assert!(parse_download_url("https://example.com/Marlin.zip").is_ok());
        assert!(parse_download_url("file:///etc/passwd").is_err());
        assert!(parse_download_url("not a url").is_err());
    }

    #[test]
    fn test_temp_download_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("download.part");
        fs::write(&path, b"partial").unwrap();
        drop(TempDownload::new(path.clone()));
        assert!(!path.exists());
        // Dropping a guard whose file never got created is fine too
        drop(TempDownload::new(temp_dir.path().join("never-created")));
    }
}
