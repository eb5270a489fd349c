//! HandBrakeCLI supervision for long-running transcodes.
//!
//! This crate provides:
//! - Local and remote (ssh-prefixed) encoder runs
//! - Progress extraction from HandBrake's status line, sampled on an interval
//! - Cooperative cancellation from the progress callback
//! - A per-run transaction log that survives failed runs

pub mod config;
pub mod error;
pub mod extract;
pub mod handbrake;
pub mod logging;
pub mod monitor;
pub mod process;
pub mod scan;
pub mod supervisor;
pub mod transaction_log;

pub use config::SupervisorConfig;
pub use error::{CallbackError, TranscodeError, TranscodeResult};
pub use extract::extract_progress;
pub use handbrake::{check_handbrake, HandBrake, HANDBRAKE_BINARY};
pub use logging::RunLogger;
pub use monitor::{ProgressMonitor, DEFAULT_MONITOR_INTERVAL};
pub use process::{EncoderProcess, LineReader, SpawnedProcess};
pub use scan::{MediaDetails, MediaInfoParser};
pub use supervisor::{supervise, Supervised};
pub use transaction_log::{current_worker_id, TransactionLog, DEFAULT_LOG_PREFIX};

pub use transcoder_models::{
    EncodeInvocation, ProgressSample, RemoteTransport, RunOutcome, RunReport, Verdict,
};
