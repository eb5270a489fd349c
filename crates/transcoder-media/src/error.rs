//! Error types for supervised encoder runs.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for transcoding operations.
pub type TranscodeResult<T> = Result<T, TranscodeError>;

/// Boxed error returned by a progress callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while supervising an encoder.
///
/// A non-zero exit code and a caller cancellation are outcomes, not errors;
/// see [`transcoder_models::RunOutcome`].
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("HandBrakeCLI not found in PATH")]
    HandBrakeNotFound,

    #[error("No encoder executable configured")]
    NotConfigured,

    #[error("Failed to launch {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove transaction log {}: {source}", path.display())]
    LogCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Media scan failed for {}: {message}", path.display())]
    ScanFailed { path: PathBuf, message: String },

    #[error("Progress callback failed: {0}")]
    Callback(#[source] CallbackError),

    /// A run failed after its transaction log was opened. The log, if
    /// still on disk, holds everything the encoder printed.
    #[error("Run failed ({command_line}): {source}")]
    RunFailed {
        command_line: String,
        log_path: Option<PathBuf>,
        #[source]
        source: Box<TranscodeError>,
    },

    #[error("Invalid invocation: {0}")]
    Invocation(#[from] transcoder_models::ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranscodeError {
    /// Create a spawn failure error.
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Create a scan failure error.
    pub fn scan_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ScanFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap an error raised mid-run with the run's diagnostics.
    pub fn run_failed(
        command_line: impl Into<String>,
        log_path: Option<&Path>,
        source: TranscodeError,
    ) -> Self {
        Self::RunFailed {
            command_line: command_line.into(),
            log_path: log_path.map(Path::to_path_buf),
            source: Box::new(source),
        }
    }

    /// Retained transaction log of a failed run.
    pub fn log_path(&self) -> Option<&Path> {
        match self {
            Self::RunFailed { log_path, .. } => log_path.as_deref(),
            Self::LogCleanup { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The underlying error, looking through [`TranscodeError::RunFailed`].
    pub fn root(&self) -> &TranscodeError {
        match self {
            Self::RunFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
