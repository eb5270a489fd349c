//! HandBrakeCLI runner with progress tracking and cancellation.

use chrono::Utc;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, Instrument};
use transcoder_models::{
    EncodeInvocation, ProgressSample, RemoteTransport, RunId, RunReport, RunState, Verdict,
};

use crate::config::SupervisorConfig;
use crate::error::{CallbackError, TranscodeError, TranscodeResult};
use crate::logging::RunLogger;
use crate::monitor::ProgressMonitor;
use crate::process::SpawnedProcess;
use crate::scan::{scan_args, MediaDetails, MediaInfoParser};
use crate::supervisor::supervise;
use crate::transaction_log::{current_worker_id, sanitize_worker_id, TransactionLog};

/// Executable name looked up in `PATH`.
pub const HANDBRAKE_BINARY: &str = "HandBrakeCLI";

/// Supervisor for HandBrakeCLI runs.
///
/// Holds configuration only. Everything about a run (command line, log
/// path, outcome) is returned in its [`RunReport`], so one value can drive
/// several runs at once.
#[derive(Debug, Clone)]
pub struct HandBrake {
    config: SupervisorConfig,
}

impl HandBrake {
    /// Create a supervisor for the executable at `cli_path`.
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self::from_config(SupervisorConfig::default().with_handbrake_path(cli_path))
    }

    /// Create a supervisor from configuration, as is.
    pub fn from_config(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Create a supervisor, resolving HandBrakeCLI from `PATH` when the
    /// configuration does not name one.
    pub fn discover(mut config: SupervisorConfig) -> TranscodeResult<Self> {
        if config.handbrake_path.is_none() {
            config.handbrake_path = Some(check_handbrake()?);
        }
        Ok(Self::from_config(config))
    }

    /// Create a supervisor for runs on a remote host.
    ///
    /// The local `PATH` says nothing about the remote one, so an unset path
    /// becomes the bare [`HANDBRAKE_BINARY`] name for the remote shell to
    /// resolve.
    pub fn for_remote(mut config: SupervisorConfig) -> Self {
        if config.handbrake_path.is_none() {
            config.handbrake_path = Some(PathBuf::from(HANDBRAKE_BINARY));
        }
        Self::from_config(config)
    }

    /// Whether an executable is configured.
    pub fn is_available(&self) -> bool {
        self.config.handbrake_path.is_some()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn cli_path(&self) -> TranscodeResult<&Path> {
        self.config
            .handbrake_path
            .as_deref()
            .ok_or(TranscodeError::NotConfigured)
    }

    /// Describe a local encode with `args`.
    pub fn local_invocation<I, S>(&self, args: I) -> TranscodeResult<EncodeInvocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(EncodeInvocation::local(self.cli_path()?, args)?)
    }

    /// Describe an encode on the host reached through `transport`.
    ///
    /// The configured executable path is used on the remote host as is.
    pub fn remote_invocation<I, S>(
        &self,
        transport: RemoteTransport,
        args: I,
    ) -> TranscodeResult<EncodeInvocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(EncodeInvocation::remote(transport, self.cli_path()?, args)?)
    }

    /// Run locally, reporting progress to `on_progress`.
    pub async fn run_local<I, S, F, E>(&self, args: I, on_progress: F) -> TranscodeResult<RunReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&ProgressSample) -> Result<Verdict, E>,
        E: Into<CallbackError>,
    {
        let invocation = self.local_invocation(args)?;
        self.run_with_progress(&invocation, on_progress).await
    }

    /// Run through `transport`, reporting progress to `on_progress`.
    pub async fn run_remote<I, S, F, E>(
        &self,
        transport: RemoteTransport,
        args: I,
        on_progress: F,
    ) -> TranscodeResult<RunReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&ProgressSample) -> Result<Verdict, E>,
        E: Into<CallbackError>,
    {
        let invocation = self.remote_invocation(transport, args)?;
        self.run_with_progress(&invocation, on_progress).await
    }

    /// Run an invocation to completion without a progress callback.
    pub async fn run(&self, invocation: &EncodeInvocation) -> TranscodeResult<RunReport> {
        self.run_with_progress(invocation, |_| Ok::<_, Infallible>(Verdict::Continue))
            .await
    }

    /// Run an invocation, passing each progress sample to `on_progress`.
    ///
    /// A spawn failure is returned before any transaction log is created.
    /// Later failures come back as [`TranscodeError::RunFailed`] carrying the
    /// retained log path. A non-zero exit code is a normal [`RunReport`]; so
    /// is a cancellation.
    pub async fn run_with_progress<F, E>(
        &self,
        invocation: &EncodeInvocation,
        on_progress: F,
    ) -> TranscodeResult<RunReport>
    where
        F: FnMut(&ProgressSample) -> Result<Verdict, E>,
        E: Into<CallbackError>,
    {
        let run_id = RunId::new();
        let operation = if invocation.is_remote() {
            "remote_encode"
        } else {
            "local_encode"
        };
        let logger = RunLogger::new(&run_id, operation);
        let span = logger.create_span();

        async move {
            let argv = invocation.argv();
            let command_line = invocation.command_line();
            logger.log_start(&command_line);

            let started_at = Utc::now();
            let process = SpawnedProcess::spawn(&argv)?;
            let state = RunState::Idle.advance(RunState::Spawned)?;
            logger.log_transition(RunState::Idle, state);

            let worker_id = match &self.config.worker_id {
                Some(id) => sanitize_worker_id(id),
                None => current_worker_id(),
            };
            let log =
                TransactionLog::open(&self.config.log_dir, &self.config.log_prefix, &worker_id)
                    .await?;

            let mut monitor = ProgressMonitor::new(process, log, self.config.monitor_interval);
            let supervised = match supervise(&mut monitor, on_progress, &logger).await {
                Ok(supervised) => supervised,
                Err(e) => {
                    return Err(TranscodeError::run_failed(
                        command_line,
                        monitor.log_path(),
                        e,
                    ))
                }
            };

            let report = RunReport {
                run_id,
                command_line,
                outcome: supervised.outcome,
                log_path: monitor.log_path().map(Path::to_path_buf),
                samples: supervised.samples,
                started_at,
                finished_at: Utc::now(),
            };
            logger.log_completion(&report.outcome);
            Ok::<_, TranscodeError>(report)
        }
        .instrument(span)
        .await
    }

    /// Scan `path` and hand the report to `parser`.
    ///
    /// Returns `None` when the parser finds the report invalid.
    pub async fn fetch_details<M: MediaInfoParser>(
        &self,
        path: impl AsRef<Path>,
        parser: &M,
    ) -> TranscodeResult<Option<M::Output>> {
        let path = path.as_ref();
        let cli = self.cli_path()?;

        if !path.exists() {
            return Err(TranscodeError::scan_failed(path, "file not found"));
        }

        let args = scan_args(path);
        debug!("Running scan: {} {}", cli.display(), args.join(" "));

        let output = Command::new(cli)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TranscodeError::spawn_failed(cli.to_string_lossy(), e))?;

        let report = String::from_utf8_lossy(&output.stderr);
        let details = parser.parse(path, &report);

        if details.is_valid() {
            Ok(Some(details))
        } else {
            debug!(
                path = %path.display(),
                exit_code = ?output.status.code(),
                "Scan produced no valid media details"
            );
            Ok(None)
        }
    }
}

/// Check if HandBrakeCLI is available.
pub fn check_handbrake() -> TranscodeResult<PathBuf> {
    which::which(HANDBRAKE_BINARY).map_err(|_| TranscodeError::HandBrakeNotFound)
}
