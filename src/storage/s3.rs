// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! S3-compatible blob store (AWS S3, MinIO, GCS interoperability endpoint).

use super::BlobStore;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(
        bucket: &str,
        endpoint: Option<&str>,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "activity-mirror");

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(region.to_string()))
            .force_path_style(endpoint.is_some());

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(bucket, endpoint = ?endpoint, "Blob store client initialized");

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/gzip")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", key, e)))?;

        tracing::debug!(key, size, "Blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    return Ok(None);
                }
                return Err(AppError::Storage(format!("Failed to read {}: {}", key, err)));
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read body of {}: {}", key, e)))?
            .into_bytes()
            .to_vec();

        Ok(Some(bytes))
    }
}
