//! Supervised HandBrakeCLI runner.
//!
//! Every argument is forwarded to HandBrakeCLI unchanged:
//!
//! ```text
//! transcoder-run -i in.mkv -o out.mkv --preset "Fast 1080p30"
//! ```

mod settings;

use std::convert::Infallible;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transcoder_media::{HandBrake, SupervisorConfig, TranscodeError};
use transcoder_models::{ProgressSample, RunOutcome, Verdict};

use settings::WorkerSettings;

/// Exit status reported when the run was vetoed.
const CANCELLED_EXIT_CODE: i32 = 124;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            if let Some(path) = e.downcast_ref::<TranscodeError>().and_then(|e| e.log_path()) {
                warn!("Transaction log kept at {}", path.display());
            }
            std::process::exit(1);
        }
    }
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("transcoder_media=info,transcoder_run=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> Result<i32> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: transcoder-run <HandBrakeCLI arguments...>");
    }

    let config = SupervisorConfig::from_env()?;
    let settings = WorkerSettings::from_env()?;
    let handbrake = if settings.remote.is_some() {
        HandBrake::for_remote(config)
    } else {
        HandBrake::discover(config).context("HandBrakeCLI is not available")?
    };
    info!("Supervisor config: {:?}", handbrake.config());

    // Wall-clock limits are enforced from the progress callback
    let started = Instant::now();
    let max_runtime = settings.max_runtime;
    let on_progress = move |_: &ProgressSample| -> Result<Verdict, Infallible> {
        let expired = max_runtime.is_some_and(|limit| started.elapsed() >= limit);
        if expired {
            warn!("Run exceeded {:?}, cancelling", max_runtime);
        }
        Ok(Verdict::from(expired))
    };

    let report = match settings.remote {
        Some(transport) => handbrake.run_remote(transport, args, on_progress).await?,
        None => handbrake.run_local(args, on_progress).await?,
    };

    if settings.print_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if let Some(path) = &report.log_path {
        warn!("Transaction log kept at {}", path.display());
    }

    Ok(match report.outcome {
        RunOutcome::Completed(code) => code,
        RunOutcome::Cancelled => CANCELLED_EXIT_CODE,
    })
}
