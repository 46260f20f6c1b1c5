// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Imports activity IDs and original files from an unpacked account export.

use super::{checkpoint, Job, JobKind, JobSettings, RunReport};
use crate::db::Catalog;
use crate::error::Result;
use crate::services::export;
use crate::storage::BlobStore;
use crate::sync::{DualStoreWriter, Reconciler, Target};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rows are inserted with source `export`; an existing row keeps its source.
/// Each mapped original file then goes through the normal reconciliation,
/// so re-importing the same export writes nothing.
pub struct FromExport {
    export_dir: PathBuf,
    catalog: Arc<dyn Catalog>,
    reconciler: Reconciler,
    settings: JobSettings,
}

impl FromExport {
    pub fn new(
        export_dir: PathBuf,
        catalog: Arc<dyn Catalog>,
        blobs: Arc<dyn BlobStore>,
        settings: JobSettings,
    ) -> Self {
        let reconciler = Reconciler::new(DualStoreWriter::new(catalog.clone(), blobs));
        Self {
            export_dir,
            catalog,
            reconciler,
            settings,
        }
    }
}

#[async_trait]
impl Job for FromExport {
    fn kind(&self) -> JobKind {
        JobKind::FromExport
    }

    fn settings(&self) -> &JobSettings {
        &self.settings
    }

    async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let index = export::read_index(&self.export_dir).await?;
        checkpoint(&cancel)?;

        let inserted = if index.candidates.is_empty() {
            0
        } else {
            self.catalog.insert_candidates(&index.candidates).await?
        };
        tracing::info!(
            rows = index.candidates.len(),
            inserted,
            files = index.files.len(),
            "Export index loaded"
        );

        let mut report = RunReport {
            candidates: index.candidates.len() as u64,
            inserted,
            ..Default::default()
        };

        // BTreeMap iteration gives ascending IDs.
        for (id, file) in &index.files {
            checkpoint(&cancel)?;

            let stored = self
                .catalog
                .get(*id)
                .await?
                .map(|record| record.original_digest)
                .unwrap_or_default();

            let (format, raw) = export::load_original(&self.export_dir, file).await?;
            let outcome = self
                .reconciler
                .reconcile(*id, &stored, Target::Original(format), &raw)
                .await?;
            report.record(outcome);
        }

        Ok(report)
    }
}
