// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciliation jobs and the harness that runs them.
//!
//! A job is one unit of work with a schedule and a wall-clock budget.
//! [`execute`] runs it on a spawned task and waits for whichever comes
//! first: completion, caller cancellation or the timeout. On cancellation
//! or timeout the task is told to stop through a child token and then
//! abandoned. Jobs check that token between records, never in the middle
//! of a record's blob/catalog pair.

pub mod from_export;
pub mod original;
pub mod poll;
pub mod runner;
pub mod sync;

pub use from_export::FromExport;
pub use original::ActivityOriginal;
pub use poll::ActivityPoll;
pub use runner::{JobInfo, JobRunner, JobState, JobStatus};
pub use sync::ActivitySync;

use crate::config::Config;
use crate::db::Catalog;
use crate::error::{AppError, CancelReason, Result};
use crate::services::{SessionClient, StravaClient};
use crate::storage::BlobStore;
use crate::sync::Outcome;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const HOURLY_AT_HALF_PAST: &str = "0 30 * * * *";
const DAILY_AT_SIX: &str = "0 0 6 * * *";

/// The jobs this service knows how to run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ActivityPoll,
    ActivitySync,
    ActivityOriginal,
    FromExport,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::ActivityPoll,
        JobKind::ActivitySync,
        JobKind::ActivityOriginal,
        JobKind::FromExport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::ActivityPoll => "activity-poll",
            JobKind::ActivitySync => "activity-sync",
            JobKind::ActivityOriginal => "activity-original",
            JobKind::FromExport => "from-export",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Compiled-in cron expression (with seconds).
    pub fn default_schedule(&self) -> &'static str {
        match self {
            JobKind::FromExport => DAILY_AT_SIX,
            _ => HOURLY_AT_HALF_PAST,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Schedule override and timeout shared by every job type.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub schedule: Option<String>,
    pub timeout: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            schedule: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Counters describing what one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Rows considered by this run.
    pub candidates: u64,
    /// New catalog rows (listing and import jobs).
    pub inserted: u64,
    pub written: u64,
    pub repaired: u64,
    pub unchanged: u64,
    /// Soft skips, e.g. activities deleted upstream.
    pub skipped: u64,
    pub marked_missing: u64,
}

impl RunReport {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Written => self.written += 1,
            Outcome::Repaired => self.repaired += 1,
        }
    }
}

/// A schedulable reconciliation run.
#[async_trait]
pub trait Job: Send + Sync {
    fn kind(&self) -> JobKind;

    fn settings(&self) -> &JobSettings;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Effective cron expression: the override if set, else the default.
    fn schedule(&self) -> &str {
        self.settings()
            .schedule
            .as_deref()
            .unwrap_or_else(|| self.kind().default_schedule())
    }

    fn timeout(&self) -> Duration {
        self.settings().timeout
    }

    /// Do the work. Implementations call [`checkpoint`] before each record.
    async fn run(&self, cancel: CancellationToken) -> Result<RunReport>;
}

/// Terminal result of one harnessed run.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded(RunReport),
    Failed(AppError),
    Cancelled(CancelReason),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// Build every job the configuration enables. `from-export` is only
/// registered when an export directory is configured.
pub fn registry(
    config: &Config,
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
) -> Result<Vec<Arc<dyn Job>>> {
    let settings = |schedule: &Option<String>| JobSettings {
        schedule: schedule.clone(),
        timeout: config.job_timeout,
    };
    let strava = StravaClient::new(&config.strava);
    let session = SessionClient::new(&config.strava)?;
    let overrides = &config.schedules;

    let mut jobs: Vec<Arc<dyn Job>> = vec![
        Arc::new(ActivityPoll::new(
            strava.clone(),
            catalog.clone(),
            settings(&overrides.activity_poll),
        )),
        Arc::new(ActivitySync::new(
            strava,
            catalog.clone(),
            blobs.clone(),
            settings(&overrides.activity_sync),
        )),
        Arc::new(ActivityOriginal::new(
            session,
            catalog.clone(),
            blobs.clone(),
            settings(&overrides.activity_original),
        )),
    ];

    if let Some(dir) = &config.export_dir {
        jobs.push(Arc::new(FromExport::new(
            dir.clone(),
            catalog,
            blobs,
            settings(&overrides.from_export),
        )));
    }

    Ok(jobs)
}

/// Stop point between records.
pub fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled(CancelReason::Signal));
    }
    Ok(())
}

/// Run `job` once under its timeout, honoring `cancel`.
pub async fn execute(job: Arc<dyn Job>, cancel: &CancellationToken) -> JobOutcome {
    let name = job.name();
    if cancel.is_cancelled() {
        tracing::info!(job = name, "Run not started: already cancelled");
        return JobOutcome::Cancelled(CancelReason::Signal);
    }

    let work_token = cancel.child_token();
    let worker = Arc::clone(&job);
    let token = work_token.clone();
    let mut handle = tokio::spawn(async move { worker.run(token).await });

    tracing::info!(job = name, timeout_secs = job.timeout().as_secs(), "Run started");

    let outcome = tokio::select! {
        biased;
        joined = &mut handle => match joined {
            Ok(Ok(report)) => JobOutcome::Succeeded(report),
            Ok(Err(AppError::Cancelled(reason))) => JobOutcome::Cancelled(reason),
            Ok(Err(err)) => JobOutcome::Failed(err),
            Err(join_err) => JobOutcome::Failed(AppError::Internal(anyhow::anyhow!(
                "Job task ended abnormally: {}",
                join_err
            ))),
        },
        _ = cancel.cancelled() => {
            work_token.cancel();
            JobOutcome::Cancelled(CancelReason::Signal)
        }
        _ = tokio::time::sleep(job.timeout()) => {
            work_token.cancel();
            JobOutcome::Cancelled(CancelReason::Timeout)
        }
    };

    match &outcome {
        JobOutcome::Succeeded(report) => {
            tracing::info!(job = name, report = ?report, "Run succeeded")
        }
        JobOutcome::Failed(err) => tracing::error!(
            job = name,
            error = %err,
            retry_next_run = err.is_storage(),
            "Run failed"
        ),
        JobOutcome::Cancelled(reason) => {
            tracing::warn!(job = name, reason = %reason, "Run cancelled")
        }
    }

    outcome
}
