//! Per-run transaction log of raw encoder output.
//!
//! Every output line is appended and flushed as it arrives, so the file
//! reflects what the encoder actually printed even if it is killed or
//! crashes. The file is removed only when the run exits cleanly; anything
//! left in the log directory marks a run that needs an operator's attention.
//!
//! File names are `<prefix>-<worker-id>-<NNN>.log` with `NNN` drawn from
//! 100..=999. Uniqueness across concurrent runs on one host is probabilistic,
//! not guaranteed.

use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{TranscodeError, TranscodeResult};

/// Default file name prefix, kept stable for existing log-scraping tools.
pub const DEFAULT_LOG_PREFIX: &str = "pytranscoder";

/// Suffix draws before giving up on finding a free log name.
pub const OPEN_ATTEMPTS: usize = 8;

/// Build a log file name.
pub fn log_file_name(prefix: &str, worker_id: &str, suffix: u16) -> String {
    format!("{}-{}-{}.log", prefix, worker_id, suffix)
}

/// Identifier of the current worker thread, safe for use in a file name.
pub fn current_worker_id() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => sanitize_worker_id(name),
        None => {
            let id = format!("{:?}", thread.id());
            let digits: String = id.chars().filter(char::is_ascii_digit).collect();
            format!("thread-{}", digits)
        }
    }
}

pub(crate) fn sanitize_worker_id(name: &str) -> String {
    let id: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if id.is_empty() {
        "worker".to_string()
    } else {
        id
    }
}

/// Append-only record of one run's output.
#[derive(Debug)]
pub struct TransactionLog {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl TransactionLog {
    /// Create a new log file in `dir`.
    ///
    /// Never reuses an existing file: a taken suffix is re-drawn, up to
    /// [`OPEN_ATTEMPTS`] times.
    pub async fn open(dir: &Path, prefix: &str, worker_id: &str) -> TranscodeResult<Self> {
        let mut last_err = None;

        for _ in 0..OPEN_ATTEMPTS {
            let suffix: u16 = rand::rng().random_range(100..=999);
            let path = dir.join(log_file_name(prefix, worker_id, suffix));

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    debug!(log_path = %path.display(), "Opened transaction log");
                    return Ok(Self {
                        path: Some(path),
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(log_path = %path.display(), "Transaction log name taken, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| std::io::Error::from(ErrorKind::AlreadyExists))
            .into())
    }

    /// Path of the log, or `None` once it has been deleted.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one line and flush it.
    pub async fn append(&mut self, line: &str) -> TranscodeResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| TranscodeError::internal("transaction log already finalized"))?;

        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    /// Close the log, deleting it if the run succeeded.
    ///
    /// Deleting an already absent file is not an error, so finalizing twice
    /// is harmless.
    pub async fn finalize(&mut self, succeeded: bool) -> TranscodeResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }

        if !succeeded {
            if let Some(path) = &self.path {
                warn!(log_path = %path.display(), "Run did not succeed, keeping transaction log");
            }
            return Ok(());
        }

        let Some(path) = self.path.take() else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(log_path = %path.display(), "Removed transaction log");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => {
                // Keep the path so the caller can still report it
                self.path = Some(path.clone());
                Err(TranscodeError::LogCleanup { path, source })
            }
        }
    }
}
