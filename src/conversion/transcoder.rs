use crate::config::AppConfig;
use crate::constants::{PROCESS_POLL_INTERVAL_MS, STDERR_DRAIN_TIMEOUT_MS};
use crate::conversion::amv_arguments;
use crate::state::BatchRunState;
use anyhow::{anyhow, Context};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Lost track of transcoder process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("Cancelled by user")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeReport {
    pub code: Option<i32>,
    pub stderr: String,
}

impl TranscodeReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait Transcoder: Send + Sync {
    /// Converts `input` into `output`, blocking until the work is done or
    /// `run_state` asks for cancellation.
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        run_state: &BatchRunState,
    ) -> Result<TranscodeReport, TranscodeError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    poll_interval: Duration,
    stderr_drain_timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            poll_interval: Duration::from_millis(PROCESS_POLL_INTERVAL_MS),
            stderr_drain_timeout: Duration::from_millis(STDERR_DRAIN_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.transcoder_path.clone())
    }

    pub fn probe_version(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("{} not found", self.program.display()))?;

        if !output.status.success() {
            return Err(anyhow!("{} -version failed", self.program.display()));
        }

        // "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) ..."
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(2))
            .map(|version| version.to_string())
            .ok_or_else(|| anyhow!("Unable to parse version of {}", self.program.display()))
    }

    fn terminate(child: &mut Child) {
        if let Err(e) = child.kill() {
            tracing::warn!("Failed to terminate transcoder process {}: {}", child.id(), e);
        }
        let _ = child.wait();
    }

    fn spawn_stderr_reader(stderr: Option<ChildStderr>) -> (Arc<Mutex<Vec<u8>>>, Receiver<()>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();

        let buffer = Arc::clone(&captured);
        thread::spawn(move || {
            if let Some(mut stderr) = stderr {
                let mut chunk = [0u8; 4096];
                loop {
                    match stderr.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = buffer.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = done_tx.send(());
        });

        (captured, done_rx)
    }

    // The child has exited, but a process it left behind may still hold the
    // pipe open. Wait for EOF at most `stderr_drain_timeout`, and stop early
    // on cancellation; whatever was read so far is returned.
    fn collect_stderr(
        &self,
        captured: &Mutex<Vec<u8>>,
        done: &Receiver<()>,
        run_state: &BatchRunState,
    ) -> String {
        let deadline = Instant::now() + self.stderr_drain_timeout;
        loop {
            match done.recv_timeout(self.poll_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if run_state.is_cancel_requested() {
                        break;
                    }
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            "Transcoder stderr still open {:?} after exit, using partial output",
                            self.stderr_drain_timeout
                        );
                        break;
                    }
                }
            }
        }

        captured
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        run_state: &BatchRunState,
    ) -> Result<TranscodeReport, TranscodeError> {
        let mut child = Command::new(&self.program)
            .args(amv_arguments(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TranscodeError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        tracing::debug!("Spawned transcoder process {}", child.id());

        let (captured, done) = Self::spawn_stderr_reader(child.stderr.take());

        loop {
            if run_state.is_cancel_requested() {
                tracing::info!("Terminating transcoder process {}", child.id());
                Self::terminate(&mut child);
                return Err(TranscodeError::Cancelled);
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    let stderr = self.collect_stderr(&captured, &done, run_state);
                    return Ok(TranscodeReport {
                        code: status.code(),
                        stderr,
                    });
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    Self::terminate(&mut child);
                    return Err(TranscodeError::Wait(e));
                }
            }
        }
    }
}
