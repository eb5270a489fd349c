//! Run supervision: drive a monitor, deliver samples, honor vetoes.

use transcoder_models::{ProgressSample, RunOutcome, RunState, Verdict};

use crate::error::{CallbackError, TranscodeError, TranscodeResult};
use crate::logging::RunLogger;
use crate::monitor::ProgressMonitor;
use crate::process::EncoderProcess;

/// Outcome of supervising one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Supervised {
    pub outcome: RunOutcome,
    /// Samples handed to the callback
    pub samples: u64,
}

/// Drive `monitor` to the end, passing each sample to `on_progress`.
///
/// The monitor must belong to a freshly spawned process. A
/// [`Verdict::Cancel`] kills the encoder once and returns
/// [`RunOutcome::Cancelled`] without reading further output. A callback
/// error also kills the encoder, then propagates.
pub async fn supervise<P, F, E>(
    monitor: &mut ProgressMonitor<P>,
    mut on_progress: F,
    logger: &RunLogger,
) -> TranscodeResult<Supervised>
where
    P: EncoderProcess,
    F: FnMut(&ProgressSample) -> Result<Verdict, E>,
    E: Into<CallbackError>,
{
    let mut state = RunState::Spawned;
    state = transition(logger, state, RunState::Monitoring)?;
    let mut samples = 0u64;

    while !state.is_terminal() {
        let Some(sample) = monitor.next_sample().await? else {
            let code = monitor.require_exit_code()?;
            state = transition(logger, state, RunState::Completed(code))?;
            continue;
        };

        samples += 1;
        logger.log_progress(&sample);

        match on_progress(&sample) {
            Ok(Verdict::Continue) => {}
            Ok(Verdict::Cancel) => {
                logger.log_cancel();
                monitor.cancel().await?;
                state = transition(logger, state, RunState::Cancelled)?;
            }
            Err(e) => {
                // Don't leave the encoder running behind a failed run
                if let Err(kill_err) = monitor.cancel().await {
                    tracing::warn!(run_id = %logger.run_id(), "Failed to kill encoder: {}", kill_err);
                }
                return Err(TranscodeError::Callback(e.into()));
            }
        }
    }

    let outcome = state
        .outcome()
        .ok_or_else(|| TranscodeError::internal("run ended in a non-terminal state"))?;

    Ok(Supervised { outcome, samples })
}

fn transition(logger: &RunLogger, from: RunState, to: RunState) -> TranscodeResult<RunState> {
    let next = from.advance(to)?;
    logger.log_transition(from, next);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedProcess;
    use crate::transaction_log::TransactionLog;
    use std::convert::Infallible;
    use std::time::Duration;
    use tempfile::TempDir;
    use transcoder_models::RunId;

    const STATUS: &str = "Encoding: task 1 of 1, 50.00 % (30.00 fps, avg 29.00 fps, ETA 00h01m00s)";

    async fn monitor_for(
        dir: &TempDir,
        process: ScriptedProcess,
        interval: Duration,
    ) -> ProgressMonitor<ScriptedProcess> {
        let log = TransactionLog::open(dir.path(), "test", "w").await.unwrap();
        ProgressMonitor::new(process, log, interval)
    }

    fn logger() -> RunLogger {
        RunLogger::new(&RunId::new(), "test")
    }

    fn busy_encoder(exit_code: i32) -> ScriptedProcess {
        ScriptedProcess::new(exit_code)
            .line_after(Duration::from_secs(1), STATUS)
            .line_after(Duration::from_secs(1), STATUS)
            .line_after(Duration::from_secs(1), STATUS)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_with_exit_code() {
        let dir = TempDir::new().unwrap();
        let mut monitor = monitor_for(&dir, busy_encoder(17), Duration::ZERO).await;

        let mut seen = Vec::new();
        let result = supervise(
            &mut monitor,
            |sample| {
                seen.push(sample.fps().to_string());
                Ok::<_, Infallible>(Verdict::Continue)
            },
            &logger(),
        )
        .await
        .unwrap();

        assert_eq!(result.outcome, RunOutcome::Completed(17));
        assert_eq!(result.samples, 3);
        assert_eq!(seen, vec!["29.00"; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_veto_on_first_sample_kills() {
        let dir = TempDir::new().unwrap();
        let process = busy_encoder(0);
        let probe = process.probe();
        let mut monitor = monitor_for(&dir, process, Duration::ZERO).await;

        let result = supervise(
            &mut monitor,
            |_| Ok::<_, Infallible>(Verdict::Cancel),
            &logger(),
        )
        .await
        .unwrap();

        assert_eq!(result.outcome, RunOutcome::Cancelled);
        assert_eq!(result.samples, 1);
        assert_eq!(probe.kills(), 1);
        assert_eq!(probe.lines_read(), 1);
        assert_eq!(probe.waits(), 0);
        assert!(monitor.log_path().unwrap().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_truthy_callback_vetoes() {
        let dir = TempDir::new().unwrap();
        let process = busy_encoder(0);
        let probe = process.probe();
        let mut monitor = monitor_for(&dir, process, Duration::ZERO).await;

        let mut calls = 0;
        let result = supervise(
            &mut monitor,
            |_| {
                calls += 1;
                Ok::<_, Infallible>(Verdict::from(calls == 2))
            },
            &logger(),
        )
        .await
        .unwrap();

        assert!(result.outcome.is_cancelled());
        assert_eq!(result.samples, 2);
        assert_eq!(probe.kills(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_samples_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let process = ScriptedProcess::new(0).line_after(Duration::from_secs(1), "Muxing...");
        let mut monitor = monitor_for(&dir, process, Duration::ZERO).await;

        let result = supervise(
            &mut monitor,
            |_| Ok::<_, Infallible>(Verdict::Cancel),
            &logger(),
        )
        .await
        .unwrap();

        assert_eq!(result.outcome, RunOutcome::Completed(0));
        assert_eq!(result.samples, 0);
        assert!(monitor.log_path().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_error_propagates_after_kill() {
        let dir = TempDir::new().unwrap();
        let process = busy_encoder(0);
        let probe = process.probe();
        let mut monitor = monitor_for(&dir, process, Duration::ZERO).await;

        let result = supervise(
            &mut monitor,
            |_| Err::<Verdict, _>(std::io::Error::other("consumer went away")),
            &logger(),
        )
        .await;

        match result {
            Err(TranscodeError::Callback(e)) => assert_eq!(e.to_string(), "consumer went away"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(probe.kills(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_propagates() {
        let dir = TempDir::new().unwrap();
        let process = ScriptedProcess::new(0)
            .line_after(Duration::from_secs(1), STATUS)
            .fail_after(Duration::from_secs(1), "pipe closed");
        let mut monitor = monitor_for(&dir, process, Duration::ZERO).await;

        let result = supervise(
            &mut monitor,
            |_| Ok::<_, Infallible>(Verdict::Continue),
            &logger(),
        )
        .await;

        assert!(matches!(result, Err(TranscodeError::Io(_))));
        assert!(monitor.log_path().unwrap().exists());
    }
}
