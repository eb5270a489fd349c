//! Run lifecycle models: verdicts, states, outcomes and reports.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for one supervised run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decision returned by a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Keep the encoder running
    #[default]
    Continue,
    /// Kill the encoder and stop monitoring
    Cancel,
}

impl Verdict {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Verdict::Cancel)
    }
}

/// `true` means veto.
impl From<bool> for Verdict {
    fn from(veto: bool) -> Self {
        if veto {
            Verdict::Cancel
        } else {
            Verdict::Continue
        }
    }
}

/// Final result of one run: an exit code or a caller cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "exit_code")]
pub enum RunOutcome {
    /// The encoder exited on its own. 0 means success.
    ///
    /// On unix a process killed by a signal reports the negated signal
    /// number.
    Completed(i32),
    /// The caller vetoed the run from the progress callback
    Cancelled,
}

impl RunOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Completed(code) => Some(*code),
            RunOutcome::Cancelled => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(0))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed(code) => write!(f, "completed (exit code {})", code),
            RunOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-run lifecycle state.
///
/// `Idle -> Spawned -> Monitoring -> {Completed | Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Spawned,
    Monitoring,
    Completed(i32),
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Spawned => "spawned",
            RunState::Monitoring => "monitoring",
            RunState::Completed(_) => "completed",
            RunState::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed(_) | RunState::Cancelled)
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(self, next: RunState) -> ModelResult<RunState> {
        let allowed = matches!(
            (self, next),
            (RunState::Idle, RunState::Spawned)
                | (RunState::Spawned, RunState::Monitoring)
                | (RunState::Monitoring, RunState::Completed(_))
                | (RunState::Monitoring, RunState::Cancelled)
        );
        if allowed {
            Ok(next)
        } else {
            Err(ModelError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Outcome of a terminal state.
    pub fn outcome(&self) -> Option<RunOutcome> {
        match self {
            RunState::Completed(code) => Some(RunOutcome::Completed(*code)),
            RunState::Cancelled => Some(RunOutcome::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the caller learns about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    /// Run identifier, also used in log fields
    pub run_id: RunId,
    /// Command line that was launched, for diagnostics
    pub command_line: String,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Transaction log left on disk, if the run did not cleanly succeed
    pub log_path: Option<PathBuf>,
    /// Number of progress samples delivered to the callback
    pub samples: u64,
    /// When the encoder was launched
    pub started_at: DateTime<Utc>,
    /// When the run ended
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn exit_code(&self) -> Option<i32> {
        self.outcome.exit_code()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Cancel);
        assert_eq!(Verdict::from(false), Verdict::Continue);
        assert!(Verdict::Cancel.is_cancel());
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(RunOutcome::Completed(17).exit_code(), Some(17));
        assert_eq!(RunOutcome::Cancelled.exit_code(), None);
        assert!(RunOutcome::Completed(0).is_success());
        assert!(!RunOutcome::Completed(1).is_success());
        assert!(!RunOutcome::Cancelled.is_success());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(RunOutcome::Completed(17)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "completed", "exit_code": 17 }));

        let json = serde_json::to_value(RunOutcome::Cancelled).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "cancelled" }));
    }

    #[test]
    fn test_state_machine_happy_path() {
        let state = RunState::Idle
            .advance(RunState::Spawned)
            .and_then(|s| s.advance(RunState::Monitoring))
            .and_then(|s| s.advance(RunState::Completed(0)))
            .unwrap();

        assert!(state.is_terminal());
        assert_eq!(state.outcome(), Some(RunOutcome::Completed(0)));
    }

    #[test]
    fn test_state_machine_rejects_skips() {
        assert!(RunState::Idle.advance(RunState::Monitoring).is_err());
        assert!(RunState::Spawned.advance(RunState::Cancelled).is_err());
        assert!(RunState::Cancelled.advance(RunState::Monitoring).is_err());
        assert!(RunState::Completed(0).advance(RunState::Cancelled).is_err());
    }

    #[test]
    fn test_run_id_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
