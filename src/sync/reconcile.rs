// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Digest-based change detection for a single record.

use super::writer::{DualStoreWriter, Target};
use crate::digest::{self, CompressedPayload};
use crate::error::{AppError, Result};
use crate::models::ActivityId;

/// What reconciling one record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fresh digest equals the catalog digest. Nothing was read or written.
    Unchanged,
    /// Blob put followed by a catalog update.
    Written,
    /// The blob already held this content; only the catalog was updated.
    Repaired,
}

#[derive(Clone)]
pub struct Reconciler {
    writer: DualStoreWriter,
}

impl Reconciler {
    pub fn new(writer: DualStoreWriter) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &DualStoreWriter {
        &self.writer
    }

    /// Compress `raw`, compare against `stored_digest` and write through if
    /// it changed.
    ///
    /// The decision is made against catalog state. A blob that already
    /// matches the fresh digest is not rewritten, but the catalog row is
    /// still brought up to date.
    pub async fn reconcile(
        &self,
        id: ActivityId,
        stored_digest: &str,
        target: Target,
        raw: &[u8],
    ) -> Result<Outcome> {
        let payload = CompressedPayload::from_raw(raw)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Compressing {}: {}", id, e)))?;

        if !stored_digest.is_empty() && stored_digest == payload.digest {
            tracing::debug!(
                activity_id = %id,
                kind = target.kind().as_str(),
                digest = %payload.digest,
                "Payload unchanged"
            );
            return Ok(Outcome::Unchanged);
        }

        let key = target.key(id);
        let existing = self.writer.blobs().get(&key).await?;
        if existing.is_some_and(|bytes| digest::digest(&bytes) == payload.digest) {
            self.writer
                .update_catalog(id, &target, &payload.digest)
                .await?;
            tracing::info!(
                activity_id = %id,
                key = %key,
                digest = %payload.digest,
                "Catalog repaired from existing blob"
            );
            return Ok(Outcome::Repaired);
        }

        self.writer.commit(id, &target, &payload).await?;
        Ok(Outcome::Written)
    }
}
