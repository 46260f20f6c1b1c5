// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process catalog for tests and dry runs.

use super::Catalog;
use crate::error::Result;
use crate::models::{
    ActivityId, ActivityMetadata, ActivityRecord, Candidate, DigestRow, OriginalFormat,
    PayloadKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Catalog held in a concurrent map. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    rows: Arc<DashMap<ActivityId, ActivityRecord>>,
    /// Number of targeted column updates applied (inserts not counted).
    updates: Arc<AtomicU64>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a row as-is.
    pub fn insert_record(&self, record: ActivityRecord) {
        self.rows.insert(record.id, record);
    }

    pub fn record(&self, id: ActivityId) -> Option<ActivityRecord> {
        self.rows.get(&id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    fn candidates(&self, kind: PayloadKind, cutoff: DateTime<Utc>) -> Vec<DigestRow> {
        let mut rows: Vec<DigestRow> = self
            .rows
            .iter()
            .filter(|r| r.is_eligible(kind, cutoff))
            .map(|r| DigestRow {
                id: r.id,
                digest: r.digest(kind).to_string(),
            })
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    fn update<F: FnOnce(&mut ActivityRecord)>(&self, id: ActivityId, apply: F) {
        if let Some(mut row) = self.rows.get_mut(&id) {
            apply(row.value_mut());
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn insert_candidates(&self, candidates: &[Candidate]) -> Result<u64> {
        let now = Utc::now();
        let mut inserted = 0;
        for candidate in candidates {
            if let Entry::Vacant(slot) = self.rows.entry(candidate.id) {
                slot.insert(ActivityRecord::new(candidate.id, candidate.source, now));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn get(&self, id: ActivityId) -> Result<Option<ActivityRecord>> {
        Ok(self.record(id))
    }

    async fn data_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>> {
        Ok(self.candidates(PayloadKind::Data, cutoff))
    }

    async fn original_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>> {
        Ok(self.candidates(PayloadKind::Original, cutoff))
    }

    async fn update_data(
        &self,
        id: ActivityId,
        digest: &str,
        metadata: &ActivityMetadata,
    ) -> Result<()> {
        self.update(id, |row| {
            row.data_digest = digest.to_string();
            row.activity_type = metadata.activity_type.clone();
            row.gear_id = metadata.gear_id.clone();
            row.timestamp = metadata.timestamp;
        });
        Ok(())
    }

    async fn update_original(
        &self,
        id: ActivityId,
        digest: &str,
        format: OriginalFormat,
    ) -> Result<()> {
        self.update(id, |row| {
            row.original_digest = digest.to_string();
            row.original_format = Some(format);
        });
        Ok(())
    }

    async fn mark_original_missing(&self, id: ActivityId) -> Result<()> {
        self.update(id, |row| row.original_format = Some(OriginalFormat::Missing));
        Ok(())
    }
}
