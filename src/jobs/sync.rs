// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirrors activity detail JSON for new and recent activities.

use super::{checkpoint, Job, JobKind, JobSettings, RunReport};
use crate::db::Catalog;
use crate::error::Result;
use crate::models::PayloadKind;
use crate::services::strava::StravaClient;
use crate::storage::BlobStore;
use crate::sync::{DualStoreWriter, Reconciler, Target};
use crate::time_utils::freshness_cutoff;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ActivitySync {
    strava: StravaClient,
    catalog: Arc<dyn Catalog>,
    reconciler: Reconciler,
    settings: JobSettings,
}

impl ActivitySync {
    pub fn new(
        strava: StravaClient,
        catalog: Arc<dyn Catalog>,
        blobs: Arc<dyn BlobStore>,
        settings: JobSettings,
    ) -> Self {
        let reconciler = Reconciler::new(DualStoreWriter::new(catalog.clone(), blobs));
        Self {
            strava,
            catalog,
            reconciler,
            settings,
        }
    }
}

#[async_trait]
impl Job for ActivitySync {
    fn kind(&self) -> JobKind {
        JobKind::ActivitySync
    }

    fn settings(&self) -> &JobSettings {
        &self.settings
    }

    async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let token = self.strava.refresh_access_token().await?;

        let cutoff = freshness_cutoff(Utc::now(), PayloadKind::Data.freshness_window());
        let rows = self.catalog.data_sync_candidates(cutoff).await?;

        let mut report = RunReport {
            candidates: rows.len() as u64,
            ..Default::default()
        };

        for row in rows {
            checkpoint(&cancel)?;

            let detail = match self.strava.get_activity(&token, row.id).await {
                Ok(detail) => detail,
                Err(err) if err.is_soft_skip() => {
                    tracing::warn!(activity_id = %row.id, error = %err, "Activity gone upstream, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let payload = detail.payload()?;
            let outcome = self
                .reconciler
                .reconcile(row.id, &row.digest, Target::Data(detail.metadata), &payload)
                .await?;
            report.record(outcome);
        }

        Ok(report)
    }
}
