// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job table shared by the scheduler, the HTTP trigger and the CLI.

use super::{execute, Job, JobKind, JobOutcome, RunReport};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Last known state of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_report: Option<RunReport>,
    pub last_error: Option<String>,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self {
            state: JobState::Idle,
            last_started: None,
            last_finished: None,
            last_report: None,
            last_error: None,
        }
    }
}

/// Listing entry for `GET /jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub name: &'static str,
    pub schedule: String,
    pub timeout_secs: u64,
    pub status: JobStatus,
}

struct Registered {
    job: Arc<dyn Job>,
    lock: Arc<Mutex<()>>,
}

/// Runs registered jobs, refusing to start a job that is already in flight.
pub struct JobRunner {
    jobs: BTreeMap<JobKind, Registered>,
    statuses: DashMap<JobKind, JobStatus>,
    shutdown: CancellationToken,
}

impl JobRunner {
    /// `shutdown` is the root token; cancelling it stops every run.
    pub fn new(jobs: Vec<Arc<dyn Job>>, shutdown: CancellationToken) -> Self {
        let statuses = DashMap::new();
        let jobs = jobs
            .into_iter()
            .map(|job| {
                statuses.insert(job.kind(), JobStatus::default());
                (
                    job.kind(),
                    Registered {
                        job,
                        lock: Arc::new(Mutex::new(())),
                    },
                )
            })
            .collect();

        Self {
            jobs,
            statuses,
            shutdown,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = JobKind> + '_ {
        self.jobs.keys().copied()
    }

    pub fn job(&self, kind: JobKind) -> Option<Arc<dyn Job>> {
        self.jobs.get(&kind).map(|r| Arc::clone(&r.job))
    }

    pub fn status(&self, kind: JobKind) -> Option<JobStatus> {
        self.statuses.get(&kind).map(|s| s.clone())
    }

    pub fn describe(&self) -> Vec<JobInfo> {
        self.jobs
            .iter()
            .map(|(kind, registered)| JobInfo {
                name: kind.name(),
                schedule: registered.job.schedule().to_string(),
                timeout_secs: registered.job.timeout().as_secs(),
                status: self.status(*kind).unwrap_or_default(),
            })
            .collect()
    }

    /// Run `kind` to completion under the harness.
    ///
    /// Returns `AppError::NotFound` for an unregistered job and
    /// `AppError::AlreadyRunning` when a run of the same job is in flight.
    pub async fn trigger(&self, kind: JobKind) -> Result<JobOutcome> {
        let registered = self
            .jobs
            .get(&kind)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", kind)))?;

        let _guard = registered
            .lock
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::AlreadyRunning(kind.name().to_string()))?;

        self.set_status(kind, |status| {
            status.state = JobState::Running;
            status.last_started = Some(Utc::now());
        });

        let outcome = execute(Arc::clone(&registered.job), &self.shutdown).await;

        self.set_status(kind, |status| {
            status.last_finished = Some(Utc::now());
            match &outcome {
                JobOutcome::Succeeded(report) => {
                    status.state = JobState::Succeeded;
                    status.last_report = Some(report.clone());
                    status.last_error = None;
                }
                JobOutcome::Failed(err) => {
                    status.state = JobState::Failed;
                    status.last_error = Some(err.to_string());
                }
                JobOutcome::Cancelled(reason) => {
                    status.state = JobState::Cancelled;
                    status.last_error = Some(format!("Run {}", reason));
                }
            }
        });

        Ok(outcome)
    }

    fn set_status<F: FnOnce(&mut JobStatus)>(&self, kind: JobKind, apply: F) {
        let mut status = self.statuses.entry(kind).or_default();
        apply(status.value_mut());
    }
}
