//! Logging initialization for the flasher

use anyhow::{Context, Result};
use chrono::Utc;
use env_logger::{Builder, Target};
use log::{LevelFilter, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Initialize stderr logging for the command line tool
pub fn init_cli_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = verbosity_level(verbose, quiet);

    Builder::from_default_env()
        .target(Target::Stderr)
        .filter_level(level)
        .format_timestamp_secs()
        .format_module_path(false)
        .try_init()
        .context("Logger already initialized")?;

    #[cfg(debug_assertions)]
    log_panics::init();

    log::debug!("Logging initialized with level: {:?}", level);
    Ok(())
}

/// Initialize logging for a long-running host process.
///
/// `structured` switches to one JSON object per line, written to `log_file`
/// when given and stdout otherwise.
pub fn init_service_logging(
    structured: bool,
    log_file: Option<&Path>,
    level: Option<LevelFilter>,
) -> Result<()> {
    let level = level.unwrap_or(LevelFilter::Info);

    let mut builder = Builder::from_default_env();
    builder.filter_level(level);

    if structured {
        let target: Box<dyn Write + Send> = match log_file {
            Some(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file {}", path.display()))?,
            ),
            None => Box::new(std::io::stdout()),
        };
        builder
            .target(Target::Pipe(target))
            .format(|buf, record| writeln!(buf, "{}", json_line(record)));
    } else {
        builder
            .target(Target::Stdout)
            .format_timestamp_secs()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    buf.timestamp(),
                    record.level(),
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            });
    }

    builder.try_init().context("Logger already initialized")?;
    log_panics::init();

    log::info!("Service logging initialized with level: {:?}", level);
    Ok(())
}

/// Map `-v`/`-q` flags to a level filter
pub fn verbosity_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

fn json_line(record: &Record) -> serde_json::Value {
    serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "level": record.level().to_string(),
        "module": record.module_path().unwrap_or("unknown"),
        "message": record.args().to_string(),
        "target": record.target(),
    })
}
