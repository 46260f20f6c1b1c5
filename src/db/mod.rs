// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relational activity catalog.
//!
//! Every write is a single statement; there are no multi-row transactions,
//! so each record's reconciliation commits independently.

pub mod memory;
pub mod postgres;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

use crate::error::Result;
use crate::models::{
    ActivityId, ActivityMetadata, ActivityRecord, Candidate, DigestRow, OriginalFormat,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Fully qualified table name.
pub const ACTIVITIES_TABLE: &str = "activities.activities";

/// Catalog operations used by the jobs.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert candidates, ignoring ids that already exist. Returns the
    /// number of new rows.
    async fn insert_candidates(&self, candidates: &[Candidate]) -> Result<u64>;

    async fn get(&self, id: ActivityId) -> Result<Option<ActivityRecord>>;

    /// Rows with an empty data digest or created after `cutoff`, ascending by id.
    async fn data_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>>;

    /// Rows with an empty original digest or created after `cutoff`,
    /// excluding rows whose original is known to be missing, ascending by id.
    async fn original_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>>;

    async fn update_data(
        &self,
        id: ActivityId,
        digest: &str,
        metadata: &ActivityMetadata,
    ) -> Result<()>;

    async fn update_original(
        &self,
        id: ActivityId,
        digest: &str,
        format: OriginalFormat,
    ) -> Result<()>;

    async fn mark_original_missing(&self, id: ActivityId) -> Result<()>;
}
