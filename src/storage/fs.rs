// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local filesystem blob store.
//!
//! Writes land in a temp file beside the target and are renamed into place,
//! so readers see either the previous object or the complete new one.

use super::BlobStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
            return Err(AppError::Storage(format!("Invalid object key {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

fn storage_err(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Storage(format!("{} {}: {}", action, path.display(), err))
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| AppError::Storage(format!("Object key {:?} has no parent", key)))?;

        fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_err("creating directory", parent, e))?;

        let temp_path = parent.join(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(|e| storage_err("opening temp file", &temp_path, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| storage_err("writing temp file", &temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_err("syncing temp file", &temp_path, e))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(storage_err("renaming temp file to", &path, err));
        }

        tracing::debug!(key, size = bytes.len(), "Blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_err("reading", &path, err)),
        }
    }
}
