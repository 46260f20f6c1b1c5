// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity mirror service and CLI.
//!
//! `serve` runs the HTTP trigger surface and, when enabled, the cron
//! scheduler. `run` and `from-export` execute one job in the foreground.

use activity_mirror::{
    config::Config,
    db::PgCatalog,
    jobs::{self, JobKind, JobOutcome, JobRunner},
    scheduler, storage, AppState,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "activity-mirror", version, about = "Mirror Strava activities into blob storage")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Run one job now and exit.
    Run {
        #[arg(value_enum)]
        job: JobKind,
        /// Override JOB_TIMEOUT_SECS for this run.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: Option<u64>,
    },
    /// Import an unpacked account export directory.
    FromExport {
        dir: PathBuf,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: Option<u64>,
    },
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling");
                shutdown.cancel();
            }
        });
    }

    let catalog = PgCatalog::connect(&config.database_url).await?;

    let (job, timeout_secs) = match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            catalog.migrate().await?;
            tracing::info!("Migrations applied");
            return Ok(());
        }
        Command::Serve => return serve(config, catalog, shutdown).await,
        Command::Run { job, timeout_secs } => (job, timeout_secs),
        Command::FromExport { dir, timeout_secs } => {
            config.export_dir = Some(dir);
            (JobKind::FromExport, timeout_secs)
        }
    };

    if let Some(secs) = timeout_secs {
        config.job_timeout = Duration::from_secs(secs);
        config.strava.clamp_request_timeout(config.job_timeout);
    }

    let blobs = storage::from_config(&config.blob).await?;
    let runner = JobRunner::new(
        jobs::registry(&config, Arc::new(catalog), blobs)?,
        shutdown,
    );

    match runner.trigger(job).await? {
        JobOutcome::Succeeded(report) => {
            tracing::info!(job = %job, report = ?report, "Done");
            Ok(())
        }
        JobOutcome::Failed(err) => Err(err.into()),
        JobOutcome::Cancelled(reason) => Err(format!("{} {}", job, reason).into()),
    }
}

async fn serve(
    config: Config,
    catalog: PgCatalog,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(port = config.port, "Starting activity mirror");

    let blobs = storage::from_config(&config.blob).await?;
    let runner = Arc::new(JobRunner::new(
        jobs::registry(&config, Arc::new(catalog), blobs)?,
        shutdown.clone(),
    ));

    let _scheduler = if config.scheduler_enabled {
        Some(scheduler::start(Arc::clone(&runner)).await?)
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        runner,
    });
    let app = activity_mirror::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("activity_mirror=debug".parse().expect("valid directive"))
                .add_directive("info".parse().expect("valid directive")),
        )
        .with(format)
        .init();
}
