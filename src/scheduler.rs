// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cron host that triggers registered jobs on their schedules.

use crate::error::{AppError, Result};
use crate::jobs::{JobOutcome, JobRunner};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Build and start a scheduler with one cron entry per registered job.
pub async fn start(runner: Arc<JobRunner>) -> Result<JobScheduler> {
    let sched = JobScheduler::new()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Creating scheduler: {}", e)))?;

    for kind in runner.kinds().collect::<Vec<_>>() {
        let Some(job) = runner.job(kind) else {
            continue;
        };
        let schedule = job.schedule().to_string();
        let runner = Arc::clone(&runner);

        let entry = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                match runner.trigger(kind).await {
                    Ok(JobOutcome::Failed(err)) => {
                        tracing::error!(job = %kind, error = %err, "Scheduled run failed")
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(job = %kind, error = %err, "Scheduled run skipped")
                    }
                }
            })
        })
        .map_err(|e| {
            AppError::Config(format!("Invalid schedule {:?} for {}: {}", schedule, kind, e))
        })?;

        sched
            .add(entry)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Adding {}: {}", kind, e)))?;
        tracing::info!(job = %kind, schedule = %schedule, "Job scheduled");
    }

    sched
        .start()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Starting scheduler: {}", e)))?;

    Ok(sched)
}
