//! Shared data models for supervised transcoding runs.
//!
//! This crate provides Serde-serializable types for:
//! - Encoder invocations, local and remote
//! - Progress samples extracted from encoder output
//! - Run outcomes, caller verdicts and per-run reports

pub mod error;
pub mod invocation;
pub mod progress;
pub mod run;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use invocation::{EncodeInvocation, RemoteTransport};
pub use progress::{ProgressSample, ETA_FIELD, FPS_FIELD};
pub use run::{RunId, RunOutcome, RunReport, RunState, Verdict};
