//! Supervisor configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{TranscodeError, TranscodeResult};
use crate::monitor::DEFAULT_MONITOR_INTERVAL;
use crate::transaction_log::DEFAULT_LOG_PREFIX;

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// HandBrakeCLI executable; `None` means not available
    pub handbrake_path: Option<PathBuf>,
    /// Minimum spacing between progress samples
    pub monitor_interval: Duration,
    /// Directory for transaction logs
    pub log_dir: PathBuf,
    /// Transaction log file name prefix
    pub log_prefix: String,
    /// Worker label used in log file names; the current thread name if unset
    pub worker_id: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            handbrake_path: None,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            log_dir: std::env::temp_dir(),
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            worker_id: None,
        }
    }
}

impl SupervisorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> TranscodeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TranscodeResult<Self> {
        let defaults = Self::default();

        let monitor_interval = match lookup("TRANSCODER_MONITOR_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                TranscodeError::config(format!(
                    "TRANSCODER_MONITOR_INTERVAL_SECS must be whole seconds, got {raw:?}"
                ))
            })?),
            None => defaults.monitor_interval,
        };

        Ok(Self {
            handbrake_path: lookup("TRANSCODER_HANDBRAKE_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            monitor_interval,
            log_dir: lookup("TRANSCODER_LOG_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            log_prefix: lookup("TRANSCODER_LOG_PREFIX")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.log_prefix),
            worker_id: lookup("TRANSCODER_WORKER_ID").filter(|s| !s.is_empty()),
        })
    }

    pub fn with_handbrake_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.handbrake_path = Some(path.into());
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = prefix.into();
        self
    }

    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }
}
