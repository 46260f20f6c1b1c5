// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ordered writes across the blob store and the catalog.
//!
//! The blob always goes first. The catalog digest is only advanced once the
//! blob put has returned, so the catalog never names content the blob store
//! does not hold. A failure between the two steps leaves a newer blob behind
//! a stale digest, which the next run repairs.

use crate::db::Catalog;
use crate::digest::CompressedPayload;
use crate::error::Result;
use crate::models::{ActivityId, ActivityMetadata, OriginalFormat, PayloadKind};
use crate::storage::{self, BlobStore};
use std::sync::Arc;

/// What a reconciled payload is and which catalog columns it updates.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Activity detail JSON; also refreshes `type`, `gear_id`, `timestamp`.
    Data(ActivityMetadata),
    /// Original upload in the given format.
    Original(OriginalFormat),
}

impl Target {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Target::Data(_) => PayloadKind::Data,
            Target::Original(_) => PayloadKind::Original,
        }
    }

    pub fn key(&self, id: ActivityId) -> String {
        match self {
            Target::Data(_) => storage::data_key(id),
            Target::Original(format) => storage::original_key(id, *format),
        }
    }
}

#[derive(Clone)]
pub struct DualStoreWriter {
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
}

impl DualStoreWriter {
    pub fn new(catalog: Arc<dyn Catalog>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { catalog, blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Put the blob, then record its digest in the catalog.
    pub async fn commit(
        &self,
        id: ActivityId,
        target: &Target,
        payload: &CompressedPayload,
    ) -> Result<()> {
        let key = target.key(id);
        self.blobs.put(&key, payload.bytes.clone()).await?;
        self.update_catalog(id, target, &payload.digest).await?;

        tracing::info!(
            activity_id = %id,
            kind = target.kind().as_str(),
            key = %key,
            digest = %payload.digest,
            "Payload written"
        );
        Ok(())
    }

    /// Catalog-only update for a blob that is already current.
    pub async fn update_catalog(&self, id: ActivityId, target: &Target, digest: &str) -> Result<()> {
        match target {
            Target::Data(metadata) => self.catalog.update_data(id, digest, metadata).await,
            Target::Original(format) => self.catalog.update_original(id, digest, *format).await,
        }
    }

    /// Record that the provider has no original for this activity.
    pub async fn mark_original_missing(&self, id: ActivityId) -> Result<()> {
        self.catalog.mark_original_missing(id).await?;
        tracing::info!(activity_id = %id, "Original marked missing");
        Ok(())
    }
}
