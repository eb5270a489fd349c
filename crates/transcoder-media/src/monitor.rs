//! Progress monitoring of a running encoder.

use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use transcoder_models::ProgressSample;

use crate::error::{TranscodeError, TranscodeResult};
use crate::extract::extract_progress;
use crate::process::EncoderProcess;
use crate::transaction_log::TransactionLog;

/// Default minimum spacing between progress samples.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Interval gate: admits a sample only strictly after the deadline, then
/// moves the deadline one interval past the admitted instant.
#[derive(Debug, Clone, Copy)]
struct SampleGate {
    interval: Duration,
    deadline: Instant,
}

impl SampleGate {
    fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            deadline: start + interval,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        if now > self.deadline {
            self.deadline = now + self.interval;
            true
        } else {
            false
        }
    }
}

/// Drains an encoder's output and yields interval-gated progress samples.
///
/// One monitor watches one process, once. Every line goes to the
/// transaction log before it is parsed. A sample is produced only when a
/// line matches *and* the sampling deadline has passed (strictly later than
/// the deadline); non-matching lines never move the deadline.
pub struct ProgressMonitor<P> {
    process: P,
    log: TransactionLog,
    gate: SampleGate,
    exit_code: Option<i32>,
    finished: bool,
}

impl<P: EncoderProcess> ProgressMonitor<P> {
    pub fn new(process: P, log: TransactionLog, interval: Duration) -> Self {
        Self {
            process,
            log,
            gate: SampleGate::starting_at(Instant::now(), interval),
            exit_code: None,
            finished: false,
        }
    }

    /// Next progress sample, or `None` once the encoder has exited.
    ///
    /// When the output ends the exit code is collected and the transaction
    /// log finalized (deleted on exit code 0). Later calls return `None`.
    pub async fn next_sample(&mut self) -> TranscodeResult<Option<ProgressSample>> {
        if self.finished {
            return Ok(None);
        }

        while let Some(line) = self.process.next_line().await? {
            self.log.append(&line).await?;
            trace!(line = %line, "Encoder output");

            let Some(sample) = extract_progress(&line) else {
                continue;
            };

            if self.gate.admit(Instant::now()) {
                return Ok(Some(sample));
            }
        }

        let code = self.process.wait().await?;
        self.exit_code = Some(code);
        self.finished = true;
        debug!(exit_code = code, "Encoder output drained");

        self.log.finalize(code == 0).await?;
        Ok(None)
    }

    /// Kill the encoder and stop monitoring. The log stays on disk.
    pub async fn cancel(&mut self) -> TranscodeResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.process.kill().await?;
        self.log.finalize(false).await
    }

    /// Exit code, once the encoder has exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Completed exit code, or an error if the monitor has not drained yet.
    pub fn require_exit_code(&self) -> TranscodeResult<i32> {
        self.exit_code
            .ok_or_else(|| TranscodeError::internal("encoder exit code not collected"))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Transaction log path, `None` once the log was deleted.
    pub fn log_path(&self) -> Option<&Path> {
        self.log.path()
    }
}
