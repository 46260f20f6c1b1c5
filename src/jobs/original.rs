// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirrors original uploads (FIT/GPX/TCX) through the web session.

use super::{checkpoint, Job, JobKind, JobSettings, RunReport};
use crate::db::Catalog;
use crate::error::Result;
use crate::models::PayloadKind;
use crate::services::session::{ExportOutcome, SessionClient};
use crate::storage::BlobStore;
use crate::sync::{DualStoreWriter, Reconciler, Target};
use crate::time_utils::freshness_cutoff;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Activities whose original is confirmed missing are never fetched again.
pub struct ActivityOriginal {
    session: SessionClient,
    catalog: Arc<dyn Catalog>,
    reconciler: Reconciler,
    settings: JobSettings,
}

impl ActivityOriginal {
    pub fn new(
        session: SessionClient,
        catalog: Arc<dyn Catalog>,
        blobs: Arc<dyn BlobStore>,
        settings: JobSettings,
    ) -> Self {
        let reconciler = Reconciler::new(DualStoreWriter::new(catalog.clone(), blobs));
        Self {
            session,
            catalog,
            reconciler,
            settings,
        }
    }
}

#[async_trait]
impl Job for ActivityOriginal {
    fn kind(&self) -> JobKind {
        JobKind::ActivityOriginal
    }

    fn settings(&self) -> &JobSettings {
        &self.settings
    }

    async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let session = self.session.login().await?;

        let cutoff = freshness_cutoff(Utc::now(), PayloadKind::Original.freshness_window());
        let rows = self.catalog.original_sync_candidates(cutoff).await?;

        let mut report = RunReport {
            candidates: rows.len() as u64,
            ..Default::default()
        };

        for row in rows {
            checkpoint(&cancel)?;

            match session.export_original(row.id).await? {
                ExportOutcome::Missing => {
                    self.reconciler.writer().mark_original_missing(row.id).await?;
                    report.marked_missing += 1;
                }
                ExportOutcome::Original { format, bytes } => {
                    let outcome = self
                        .reconciler
                        .reconcile(row.id, &row.digest, Target::Original(format), &bytes)
                        .await?;
                    report.record(outcome);
                }
            }
        }

        Ok(report)
    }
}
