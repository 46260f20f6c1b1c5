// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable blob storage for mirrored payloads.
//!
//! Objects are opaque gzip streams. They are only read back to compare
//! digests during read-repair.

pub mod fs;
pub mod memory;
pub mod s3;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use crate::config::BlobConfig;
use crate::error::Result;
use crate::models::{ActivityId, OriginalFormat};
use async_trait::async_trait;
use std::sync::Arc;

/// Whole-object blob store. A `put` either fully replaces the object or
/// leaves the previous generation in place.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// `Ok(None)` when the object does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Object key for an activity's JSON detail.
pub fn data_key(id: ActivityId) -> String {
    format!("activities/activities/{}.json.gz", id)
}

/// Object key for an activity's original upload.
pub fn original_key(id: ActivityId, format: OriginalFormat) -> String {
    format!("activities/original/{}.{}.gz", id, format.as_str())
}

/// Build the configured backend.
pub async fn from_config(config: &BlobConfig) -> Result<Arc<dyn BlobStore>> {
    match config {
        BlobConfig::S3 {
            bucket,
            endpoint,
            region,
            access_key,
            secret_key,
        } => Ok(Arc::new(S3BlobStore::new(
            bucket,
            endpoint.as_deref(),
            region,
            access_key,
            secret_key,
        ))),
        BlobConfig::Fs { root } => Ok(Arc::new(FsBlobStore::new(root.clone()))),
    }
}
