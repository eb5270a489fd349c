//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for supervised encoder runs with
//! tracing spans and contextual information.

use tracing::{info, warn, Span};
use transcoder_models::{ProgressSample, RunId, RunOutcome, RunState};

/// Run logger for structured logging with consistent formatting.
///
/// Every event carries the run ID and the operation type.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Create a new run logger.
    ///
    /// # Arguments
    /// * `run_id` - The unique identifier for the run
    /// * `operation` - The type of operation (e.g., "local_encode", "remote_encode")
    pub fn new(run_id: &RunId, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the launch of an encoder.
    pub fn log_start(&self, command_line: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", command_line
        );
    }

    /// Log a state machine transition.
    pub fn log_transition(&self, from: RunState, to: RunState) {
        tracing::debug!(
            run_id = %self.run_id,
            operation = %self.operation,
            from = %from,
            to = %to,
            "Run state changed"
        );
    }

    /// Log a progress sample.
    pub fn log_progress(&self, sample: &ProgressSample) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            fps = %sample.fps(),
            eta = %sample.eta(),
            "Run progress"
        );
    }

    /// Log a caller veto.
    pub fn log_cancel(&self) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run cancelled by progress callback"
        );
    }

    /// Log the end of a run.
    pub fn log_completion(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Completed(0) | RunOutcome::Cancelled => info!(
                run_id = %self.run_id,
                operation = %self.operation,
                "Run finished: {}", outcome
            ),
            RunOutcome::Completed(code) => warn!(
                run_id = %self.run_id,
                operation = %self.operation,
                exit_code = code,
                "Run finished: {}", outcome
            ),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "local_encode");

        assert_eq!(logger.run_id(), run_id.to_string());
        assert_eq!(logger.operation(), "local_encode");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = RunLogger::new(&RunId::new(), "remote_encode");

        logger.log_start("ssh bob@host HandBrakeCLI");
        logger.log_transition(RunState::Idle, RunState::Spawned);
        logger.log_progress(&ProgressSample::new("10.0", "00h01m00s"));
        logger.log_cancel();
        logger.log_completion(&RunOutcome::Completed(3));
        let _span = logger.create_span();
    }
}
