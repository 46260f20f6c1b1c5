// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_mirror::config::Config;
use activity_mirror::db::{Catalog, MemoryCatalog};
use activity_mirror::error::{AppError, Result};
use activity_mirror::jobs::{Job, JobRunner};
use activity_mirror::models::{
    ActivityId, ActivityMetadata, ActivityRecord, Candidate, DigestRow, OriginalFormat,
    RecordSource,
};
use activity_mirror::routes::create_router;
use activity_mirror::storage::{BlobStore, MemoryBlobStore};
use activity_mirror::AppState;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const ACCESS_TOKEN: &str = "test_access_token";
pub const LOGIN_TOKEN: &str = "tok123";
pub const SESSION_COOKIE: &str = "_strava4_session=after_login";

/// Config pointing every Strava endpoint at `server`.
#[allow(dead_code)]
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::test_default();
    config.strava.api_url = format!("{}/api/v3", server.uri());
    config.strava.token_url = format!("{}/oauth/token", server.uri());
    config.strava.web_url = server.uri();
    config
}

/// Seed a catalog row.
#[allow(dead_code)]
pub fn seed(catalog: &MemoryCatalog, id: u64, data_digest: &str, original_digest: &str) {
    seed_at(catalog, id, data_digest, original_digest, Utc::now() - Duration::days(1));
}

#[allow(dead_code)]
pub fn seed_at(
    catalog: &MemoryCatalog,
    id: u64,
    data_digest: &str,
    original_digest: &str,
    created_at: DateTime<Utc>,
) {
    let mut record = ActivityRecord::new(ActivityId(id), RecordSource::Polling, created_at);
    record.data_digest = data_digest.to_string();
    record.original_digest = original_digest.to_string();
    catalog.insert_record(record);
}

/// True when every row's digests agree with blob presence: a non-empty
/// data digest has a data blob and an empty one has none.
#[allow(dead_code)]
pub fn data_pairs_consistent(catalog: &MemoryCatalog, blobs: &MemoryBlobStore, ids: &[u64]) -> bool {
    ids.iter().all(|id| {
        let record = catalog.record(ActivityId(*id)).expect("seeded row");
        let blob = blobs.object(&activity_mirror::storage::data_key(ActivityId(*id)));
        record.data_digest.is_empty() == blob.is_none()
    })
}

// ─── Mock Strava ─────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": ACCESS_TOKEN,
            "refresh_token": "test_refresh_token",
            "expires_at": 1_900_000_000
        })))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn activity_json(id: u64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "type": "Ride",
        "gear_id": "b12345",
        "start_date": "2026-03-14T07:30:00Z"
    })
}

#[allow(dead_code)]
pub async fn mount_activity(server: &MockServer, id: u64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/activities/{}", id)))
        .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_deleted_activity(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/activities/{}", id)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Record Not Found",
            "errors": [{"resource": "Activity", "field": "id", "code": "invalid"}]
        })))
        .mount(server)
        .await;
}

/// Login page plus a session POST that redirects to the dashboard.
#[allow(dead_code)]
pub async fn mount_login(server: &MockServer) {
    let page = format!(
        r#"<html><body><form id="login_form" action="/session" method="post">
             <input type="hidden" name="authenticity_token" value="{}">
           </form></body></html>"#,
        LOGIN_TOKEN
    );
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_strava4_session=before_login; path=/")
                .set_body_string(page),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .and(header("cookie", "_strava4_session=before_login"))
        .and(body_string_contains(format!("authenticity_token={}", LOGIN_TOKEN).as_str()))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/dashboard", server.uri()).as_str())
                .insert_header("set-cookie", format!("{}; path=/", SESSION_COOKIE).as_str()),
        )
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_original(server: &MockServer, id: u64, file_name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/activities/{}/export_original", id)))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    format!(r#"attachment; filename="{}""#, file_name).as_str(),
                )
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub async fn mount_no_original(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/activities/{}/export_original", id)))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/activities/redirected"),
        )
        .mount(server)
        .await;
}

// ─── Failure injection ───────────────────────────────────────────────────────

/// Blob store whose puts fail for selected keys.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FlakyBlobStore {
    pub inner: MemoryBlobStore,
    failing: Arc<Mutex<HashSet<String>>>,
}

#[allow(dead_code)]
impl FlakyBlobStore {
    pub fn fail_key(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(AppError::Storage(format!("injected failure for {}", key)));
        }
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }
}

/// Catalog whose targeted updates fail while `broken` is set.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FlakyCatalog {
    pub inner: MemoryCatalog,
    broken: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
impl FlakyCatalog {
    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap() = broken;
    }

    fn check(&self) -> Result<()> {
        if *self.broken.lock().unwrap() {
            return Err(AppError::Database("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for FlakyCatalog {
    async fn insert_candidates(&self, candidates: &[Candidate]) -> Result<u64> {
        self.inner.insert_candidates(candidates).await
    }

    async fn get(&self, id: ActivityId) -> Result<Option<ActivityRecord>> {
        self.inner.get(id).await
    }

    async fn data_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>> {
        self.inner.data_sync_candidates(cutoff).await
    }

    async fn original_sync_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<DigestRow>> {
        self.inner.original_sync_candidates(cutoff).await
    }

    async fn update_data(
        &self,
        id: ActivityId,
        digest: &str,
        metadata: &ActivityMetadata,
    ) -> Result<()> {
        self.check()?;
        self.inner.update_data(id, digest, metadata).await
    }

    async fn update_original(
        &self,
        id: ActivityId,
        digest: &str,
        format: OriginalFormat,
    ) -> Result<()> {
        self.check()?;
        self.inner.update_original(id, digest, format).await
    }

    async fn mark_original_missing(&self, id: ActivityId) -> Result<()> {
        self.check()?;
        self.inner.mark_original_missing(id).await
    }
}

// ─── App ─────────────────────────────────────────────────────────────────────

/// Create a test app over the given jobs.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(jobs: Vec<Arc<dyn Job>>) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Config::test_default(),
        runner: Arc::new(JobRunner::new(jobs, CancellationToken::new())),
    });
    (create_router(state.clone()), state)
}
