// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inserts newly listed activities into the catalog.

use super::{checkpoint, Job, JobKind, JobSettings, RunReport};
use crate::db::Catalog;
use crate::error::Result;
use crate::models::Candidate;
use crate::services::strava::{StravaClient, DEFAULT_PAGE_SIZE};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lists the first page of the athlete's activities and upserts each ID
/// with source `polling`. Existing rows are left alone.
pub struct ActivityPoll {
    strava: StravaClient,
    catalog: Arc<dyn Catalog>,
    settings: JobSettings,
}

impl ActivityPoll {
    pub fn new(strava: StravaClient, catalog: Arc<dyn Catalog>, settings: JobSettings) -> Self {
        Self {
            strava,
            catalog,
            settings,
        }
    }
}

#[async_trait]
impl Job for ActivityPoll {
    fn kind(&self) -> JobKind {
        JobKind::ActivityPoll
    }

    fn settings(&self) -> &JobSettings {
        &self.settings
    }

    async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let token = self.strava.refresh_access_token().await?;
        checkpoint(&cancel)?;

        let page = self
            .strava
            .list_activities(&token, 1, DEFAULT_PAGE_SIZE)
            .await?;
        let candidates: Vec<Candidate> = page.iter().map(|a| a.candidate()).collect();
        checkpoint(&cancel)?;

        let inserted = if candidates.is_empty() {
            0
        } else {
            self.catalog.insert_candidates(&candidates).await?
        };

        tracing::info!(listed = candidates.len(), inserted, "New activities");

        Ok(RunReport {
            candidates: candidates.len() as u64,
            inserted,
            ..Default::default()
        })
    }
}
