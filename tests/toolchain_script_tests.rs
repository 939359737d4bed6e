//! Toolchain tests against generated stand-in executables
//!
//! Every test here writes and runs shell scripts. They share one lock so a
//! script is never executed while another test still holds it open for
//! writing.

#![cfg(unix)]


use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard, mpsc};

use marlin_flasher::config::MemorySettingsStore;
use marlin_flasher::errors::FlasherError;
use marlin_flasher::models::{FlashOptions, OutputStream, SetupDiagnostic};
use marlin_flasher::services::{FlashOrchestrator, MarlinFlasher};
use marlin_flasher::toolchain::{ArduinoCli, PlatformIo, Toolchain};

use mock_hardware::{MockPrinter, RecordingPublisher, call_log, calls};
use test_fixtures::{hex_file, isolated_settings, marlin_archive};

async fn script_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().await
}

/// Write an executable `/bin/sh` script named `name` into `dir`
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script that records its arguments in `args.txt` next to itself, then runs `body`
fn recording_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let args_file = dir.join("args.txt");
    write_script(
        dir,
        name,
        &format!("echo \"$@\" >> '{}'\n{}", args_file.display(), body),
    )
}

fn recorded_args(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("args.txt"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn arduino(path: PathBuf) -> ArduinoCli {
    ArduinoCli::new(Some(path), "Marlin.ino".to_string())
}

fn mega_options() -> FlashOptions {
    FlashOptions::new()
        .with("fqbn", "arduino:avr:mega")
        .with("cpu", "atmega2560")
}

#[tokio::test]
async fn test_supported_arduino_cli_passes_setup() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "arduino-cli",
        r#"echo '{"VersionString":"0.35.3","Commit":"95cfd654","Status":"alpha"}'"#,
    );

    assert!(arduino(script).check_setup().await.is_empty());
}

#[tokio::test]
async fn test_old_arduino_cli_is_unsupported() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "arduino-cli",
        "echo 'arduino-cli Version: 0.13.0 Commit: 17d24eb0'",
    );

    let diagnostics = arduino(script).check_setup().await;
    assert_eq!(
        diagnostics,
        vec![SetupDiagnostic::UnsupportedVersion {
            found: "0.13.0".to_string()
        }]
    );
    assert_eq!(diagnostics[0].code(), "UnsupportedVersion");
}

#[tokio::test]
async fn test_unrecognised_or_failing_executables_are_not_executable() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let garbage = write_script(temp_dir.path(), "garbage", "echo 'hello world'");
    let failing = write_script(temp_dir.path(), "failing", "echo boom >&2\nexit 3");

    assert_eq!(
        arduino(garbage).check_setup().await,
        vec![SetupDiagnostic::NotExecutable]
    );
    assert_eq!(
        arduino(failing).check_setup().await,
        vec![SetupDiagnostic::NotExecutable]
    );
    assert_eq!(
        arduino(temp_dir.path().join("missing")).check_setup().await,
        vec![SetupDiagnostic::NotExecutable]
    );
}

#[tokio::test]
async fn test_unconfigured_paths() {
    let _lock = script_lock().await;
    assert_eq!(
        ArduinoCli::new(None, "Marlin.ino".to_string())
            .check_setup()
            .await,
        vec![SetupDiagnostic::NotConfigured]
    );
    assert_eq!(
        PlatformIo::new(Some(PathBuf::new())).check_setup().await,
        vec![SetupDiagnostic::NotConfigured]
    );
}

#[tokio::test]
async fn test_platformio_version_family() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let current = write_script(
        temp_dir.path(),
        "pio6",
        "echo 'PlatformIO Core, version 6.1.15'",
    );
    let ancient = write_script(temp_dir.path(), "pio3", "echo 'PlatformIO, version 3.6.7'");

    assert!(PlatformIo::new(Some(current)).check_setup().await.is_empty());
    assert_eq!(
        PlatformIo::new(Some(ancient)).check_setup().await,
        vec![SetupDiagnostic::UnsupportedVersion {
            found: "3.6.7".to_string()
        }]
    );
}

#[tokio::test]
async fn test_arduino_compile_arguments_and_output() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = recording_script(
        temp_dir.path(),
        "arduino-cli",
        "echo 'Sketch uses 123456 bytes'\necho 'warning: deprecated' >&2",
    );
    let cli = arduino(script);
    let staged = marlin_flasher::models::FirmwareArtifact::source_project(
        temp_dir.path().join("Marlin"),
        Default::default(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    cli.compile(&staged, &mega_options(), Some(&tx)).await.unwrap();
    drop(tx);

    assert_eq!(
        recorded_args(temp_dir.path()),
        vec![format!(
            "compile --fqbn arduino:avr:mega:cpu=atmega2560 {}",
            temp_dir.path().join("Marlin").display()
        )]
    );

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    assert!(lines.contains(&(OutputStream::Stdout, "Sketch uses 123456 bytes".to_string())));
    assert!(lines.contains(&(OutputStream::Stderr, "warning: deprecated".to_string())));
}

#[tokio::test]
async fn test_failed_compile_carries_stderr() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "arduino-cli",
        "echo 'Marlin.ino:3:1: error: expected ; before }' >&2\nexit 1",
    );
    let staged = marlin_flasher::models::FirmwareArtifact::source_project(
        temp_dir.path().to_path_buf(),
        Default::default(),
    );

    let err = arduino(script)
        .compile(&staged, &mega_options(), None)
        .await
        .unwrap_err();
    assert!(err.is_toolchain());
    assert_eq!(
        err.captured_output().as_deref(),
        Some("Marlin.ino:3:1: error: expected ; before }")
    );
}

#[tokio::test]
async fn test_management_commands_parse_json() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = recording_script(
        temp_dir.path(),
        "arduino-cli",
        r#"echo '[{"id":"arduino:avr","latest":"1.8.6"}]'"#,
    );
    let cli = arduino(script);

    let cores = cli.core_search("avr").await.unwrap();
    assert_eq!(cores[0]["id"], "arduino:avr");
    cli.board_details("arduino:avr:mega").await.unwrap();

    assert_eq!(
        recorded_args(temp_dir.path()),
        vec![
            "core search avr --format json".to_string(),
            "board details -b arduino:avr:mega --format json".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_blank_management_request_never_runs_the_tool() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = recording_script(temp_dir.path(), "arduino-cli", "echo '{}'");

    let err = arduino(script).lib_install("  ").await.unwrap_err();
    assert!(matches!(err, FlasherError::Validation(_)));
    assert_eq!(err.to_string(), "The lib field is missing");
    assert!(recorded_args(temp_dir.path()).is_empty());
}

#[tokio::test]
async fn test_orchestrated_hex_flash_with_arduino_cli() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = recording_script(temp_dir.path(), "arduino-cli", "echo 'avrdude done'");

    let log = call_log();
    let publisher = Arc::new(RecordingPublisher::default());
    let orchestrator = FlashOrchestrator::new(
        Arc::new(arduino(script)),
        Arc::new(MockPrinter::connected(log.clone(), "/dev/ttyACM0", 115_200)),
        publisher.clone(),
        Arc::new(MemorySettingsStore::new(isolated_settings(&temp_dir))),
    );

    let artifact = orchestrator.upload(&hex_file(temp_dir.path())).await.unwrap();
    orchestrator
        .flash(FlashOptions::new().with("fqbn", "arduino:avr:mega"))
        .await
        .unwrap();
    let status = orchestrator.wait_for_flash().await;
    assert!(status.success, "{:?}", status);

    assert_eq!(
        recorded_args(temp_dir.path()),
        vec![format!(
            "upload --fqbn arduino:avr:mega --port /dev/ttyACM0 --input-file {}",
            artifact.location.display()
        )]
    );
    let output = publisher.on_topic("toolchain_output");
    assert_eq!(output[0]["line"], "avrdude done");
}

#[tokio::test]
async fn test_orchestrated_compile_failure_with_arduino_cli() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(
        temp_dir.path(),
        "arduino-cli",
        "echo 'Error during build: exit status 1' >&2\nexit 1",
    );

    let log = call_log();
    let orchestrator = FlashOrchestrator::new(
        Arc::new(arduino(script)),
        Arc::new(MockPrinter::connected(log.clone(), "/dev/ttyACM0", 115_200)),
        Arc::new(RecordingPublisher::default()),
        Arc::new(MemorySettingsStore::new(isolated_settings(&temp_dir))),
    );

    orchestrator
        .upload(&marlin_archive(temp_dir.path()))
        .await
        .unwrap();
    orchestrator.flash(mega_options()).await.unwrap();
    let status = orchestrator.wait_for_flash().await;

    assert!(!status.success);
    assert_eq!(
        status.error_output.as_deref(),
        Some("Error during build: exit status 1")
    );
    assert!(mock_hardware::calls(&log).is_empty());
    assert!(orchestrator.firmware_info().await.is_some());
}

#[tokio::test]
async fn test_reload_keeps_a_pending_post_flash_script() {
    let _lock = script_lock().await;
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "arduino-cli", "echo 'avrdude done'");

    let mut settings = isolated_settings(&temp_dir);
    settings.arduino.cli_path = Some(script);
    settings.post_flash_script = Some("M115".to_string());

    let log = call_log();
    let flasher = MarlinFlasher::new(
        Arc::new(MemorySettingsStore::new(settings)),
        Arc::new(MockPrinter::connected(log.clone(), "/dev/ttyACM0", 115_200)),
        Arc::new(RecordingPublisher::default()),
    );
    let orchestrator = flasher.orchestrator().await;
    orchestrator.upload(&hex_file(temp_dir.path())).await.unwrap();
    orchestrator
        .flash(FlashOptions::new().with("fqbn", "arduino:avr:mega"))
        .await
        .unwrap();
    assert!(orchestrator.wait_for_flash().await.success);
    assert!(orchestrator.post_flash_pending().await);

    flasher.reload().await.unwrap();
    let reloaded = flasher.orchestrator().await;
    assert!(reloaded.post_flash_pending().await);
    assert!(reloaded.handle_connected_event().await.unwrap());
    assert_eq!(calls(&log).last(), Some(&"printer.send:M115".to_string()));
}
