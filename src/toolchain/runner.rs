//! Supervised execution of toolchain executables

use log::{debug, trace, warn};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::OutputStream;

/// Receives every captured line while the process runs
pub type LineSink = mpsc::UnboundedSender<(OutputStream, String)>;

/// Reported instead of an error when the executable cannot be started at all
pub const EXECUTABLE_NOT_FOUND: &str = "The given executable does not exist.";

/// Outcome of one toolchain invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOutput {
    /// Exit code was zero
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolchainOutput {
    fn start_failure(message: String) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: message,
        }
    }

    /// Text to show the user after a failure: stderr, or stdout when stderr is empty
    pub fn failure_text(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }
}

/// Runs an executable, draining stdout and stderr concurrently
pub struct ToolchainRunner;

impl ToolchainRunner {
    /// Run `executable` with `args` until it exits.
    ///
    /// Lines are forwarded to `sink` in emission order per stream. A process
    /// that cannot be spawned yields `succeeded == false` with an explanatory
    /// stderr instead of an error.
    pub async fn run(executable: &Path, args: &[String], sink: Option<&LineSink>) -> ToolchainOutput {
        let command_line = Self::command_line(executable, args);
        debug!("🔨 Executing: {}", command_line);

        let mut child = match Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Executable not found: {}", executable.display());
                return ToolchainOutput::start_failure(EXECUTABLE_NOT_FOUND.to_string());
            }
            Err(e) => {
                warn!("Failed to start {}: {}", executable.display(), e);
                return ToolchainOutput::start_failure(format!(
                    "Failed to start {}: {}",
                    executable.display(),
                    e
                ));
            }
        };

        let stdout_task = child
            .stdout
            .take()
            .map(|out| Self::drain(out, OutputStream::Stdout, sink.cloned()));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| Self::drain(err, OutputStream::Stderr, sink.cloned()));

        let status = child.wait().await;

        let stdout = Self::collect(stdout_task).await;
        let stderr = Self::collect(stderr_task).await;

        match status {
            Ok(status) => {
                debug!("{} exited with {}", command_line, status);
                ToolchainOutput {
                    succeeded: status.success(),
                    stdout,
                    stderr,
                }
            }
            Err(e) => {
                warn!("Failed to wait for {}: {}", command_line, e);
                ToolchainOutput {
                    succeeded: false,
                    stdout,
                    stderr: format!("Failed to wait for {}: {}", executable.display(), e),
                }
            }
        }
    }

    /// Printable command line, for logs and error messages
    pub fn command_line(executable: &Path, args: &[String]) -> String {
        let mut line = executable.display().to_string();
        for arg in args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn drain<R>(reader: R, stream: OutputStream, sink: Option<LineSink>) -> JoinHandle<String>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buffer = Vec::new();
            let mut captured = String::new();

            loop {
                buffer.clear();
                match reader.read_until(b'\n', &mut buffer).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buffer)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        trace!("[{:?}] {}", stream, line);
                        captured.push_str(&line);
                        captured.push('\n');
                        if let Some(tx) = &sink {
                            let _ = tx.send((stream, line));
                        }
                    }
                    Err(e) => {
                        debug!("Stopped reading {:?}: {}", stream, e);
                        break;
                    }
                }
            }

            captured
        })
    }

    async fn collect(task: Option<JoinHandle<String>>) -> String {
        match task {
            Some(handle) => handle
                .await
                .map(|text| text.trim().to_string())
                .unwrap_or_default(),
            None => String::new(),
        }
    }
}
