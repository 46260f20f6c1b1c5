// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end job runs against a mocked provider and in-memory stores.

mod common;

use activity_mirror::db::MemoryCatalog;
use activity_mirror::digest::{self, CompressedPayload};
use activity_mirror::error::{AppError, CancelReason};
use activity_mirror::jobs::{
    execute, ActivityOriginal, ActivityPoll, ActivitySync, FromExport, JobOutcome, JobSettings,
    RunReport,
};
use activity_mirror::models::{ActivityId, OriginalFormat, RecordSource};
use activity_mirror::services::{SessionClient, StravaClient};
use activity_mirror::storage::MemoryBlobStore;
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

fn expect_success(outcome: JobOutcome) -> RunReport {
    match outcome {
        JobOutcome::Succeeded(report) => report,
        other => panic!("unexpected outcome {:?}", other),
    }
}

fn sync_job(server: &MockServer, catalog: &MemoryCatalog, blobs: &MemoryBlobStore) -> ActivitySync {
    ActivitySync::new(
        StravaClient::new(&test_config(server).strava),
        Arc::new(catalog.clone()),
        Arc::new(blobs.clone()),
        JobSettings::default(),
    )
}

fn original_job(
    server: &MockServer,
    catalog: &MemoryCatalog,
    blobs: &MemoryBlobStore,
) -> ActivityOriginal {
    ActivityOriginal::new(
        SessionClient::new(&test_config(server).strava).unwrap(),
        Arc::new(catalog.clone()),
        Arc::new(blobs.clone()),
        JobSettings::default(),
    )
}

#[tokio::test]
async fn test_poll_inserts_new_ids_only() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "name": "c"}, {"id": 2, "name": "b"}, {"id": 1, "name": "a"}
        ])))
        .mount(&server)
        .await;

    let catalog = MemoryCatalog::new();
    seed(&catalog, 2, "", "");
    let job = ActivityPoll::new(
        StravaClient::new(&test_config(&server).strava),
        Arc::new(catalog.clone()),
        JobSettings::default(),
    );

    let report = expect_success(execute(Arc::new(job), &CancellationToken::new()).await);

    assert_eq!(report.candidates, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(catalog.len(), 3);
    assert_eq!(
        catalog.record(ActivityId(3)).unwrap().source,
        RecordSource::Polling
    );
}

#[tokio::test]
async fn test_sync_writes_changed_and_skips_deleted() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_activity(&server, 1, activity_json(1, "one")).await;
    mount_deleted_activity(&server, 2).await;
    mount_activity(&server, 3, activity_json(3, "three")).await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1, "", "");
    seed(&catalog, 2, "", "");
    // Already mirrored and unchanged upstream.
    let three = serde_json::to_vec_pretty(&activity_json(3, "three")).unwrap();
    seed(&catalog, 3, &CompressedPayload::from_raw(&three).unwrap().digest, "");

    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    let report = expect_success(execute(job.clone(), &CancellationToken::new()).await);

    assert_eq!(report.candidates, 3);
    assert_eq!((report.written, report.unchanged, report.skipped), (1, 1, 1));
    assert_eq!(blobs.keys(), vec!["activities/activities/1.json.gz".to_string()]);

    let row = catalog.record(ActivityId(1)).unwrap();
    assert_eq!(row.activity_type.as_deref(), Some("Ride"));
    assert_eq!(row.gear_id.as_deref(), Some("b12345"));
    assert!(row.timestamp.is_some());

    // Nothing changed upstream: the second run writes nothing.
    let puts = blobs.put_count();
    let updates = catalog.update_count();
    let again = expect_success(execute(job, &CancellationToken::new()).await);
    assert_eq!(again.written, 0);
    assert_eq!(again.unchanged, 2);
    assert_eq!(blobs.put_count(), puts);
    assert_eq!(catalog.update_count(), updates);
}

#[tokio::test]
async fn test_sync_processes_ids_in_ascending_order() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    for id in [5u64, 7, 9] {
        mount_activity(&server, id, activity_json(id, "x")).await;
    }

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    for id in [9u64, 5, 7] {
        seed(&catalog, id, "", "");
    }

    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    expect_success(execute(job, &CancellationToken::new()).await);

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let fetched: Vec<String> = requests
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p.starts_with("/api/v3/activities/"))
        .collect();
    assert_eq!(
        fetched,
        vec![
            "/api/v3/activities/5",
            "/api/v3/activities/7",
            "/api/v3/activities/9"
        ]
    );
}

#[tokio::test]
async fn test_sync_skips_rows_outside_freshness_window() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed_at(&catalog, 1, "cafebabe", "", Utc::now() - ChronoDuration::days(30));

    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    let report = expect_success(execute(job, &CancellationToken::new()).await);

    assert_eq!(report.candidates, 0);
    assert_eq!(blobs.put_count(), 0);
}

#[tokio::test]
async fn test_sync_upstream_error_fails_run_and_keeps_prefix() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_activity(&server, 1, activity_json(1, "one")).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/activities/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_activity(&server, 3, activity_json(3, "three")).await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    for id in [1u64, 2, 3] {
        seed(&catalog, id, "", "");
    }

    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    let outcome = execute(job, &CancellationToken::new()).await;

    assert!(matches!(outcome, JobOutcome::Failed(AppError::SourceFetch(_))));
    assert!(!catalog.record(ActivityId(1)).unwrap().data_digest.is_empty());
    assert!(catalog.record(ActivityId(2)).unwrap().data_digest.is_empty());
    assert!(catalog.record(ActivityId(3)).unwrap().data_digest.is_empty());
    assert!(data_pairs_consistent(&catalog, &blobs, &[1, 2, 3]));
}

#[tokio::test]
async fn test_sync_auth_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1, "", "");

    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    let outcome = execute(job, &CancellationToken::new()).await;

    assert!(matches!(outcome, JobOutcome::Failed(AppError::Auth(_))));
    assert_eq!(blobs.put_count(), 0);
    assert_eq!(catalog.update_count(), 0);
}

#[tokio::test]
async fn test_sync_storage_failure_is_retried_next_run() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_activity(&server, 1, activity_json(1, "one")).await;

    let catalog = MemoryCatalog::new();
    let blobs = FlakyBlobStore::default();
    seed(&catalog, 1, "", "");
    blobs.fail_key(&activity_mirror::storage::data_key(ActivityId(1)));

    let job = Arc::new(ActivitySync::new(
        StravaClient::new(&test_config(&server).strava),
        Arc::new(catalog.clone()),
        Arc::new(blobs.clone()),
        JobSettings::default(),
    ));

    match execute(job.clone(), &CancellationToken::new()).await {
        JobOutcome::Failed(err) => assert!(err.is_storage()),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(catalog.record(ActivityId(1)).unwrap().data_digest.is_empty());

    blobs.heal();
    let report = expect_success(execute(job, &CancellationToken::new()).await);
    assert_eq!(report.written, 1);
    assert!(data_pairs_consistent(&catalog, &blobs.inner, &[1]));
}

#[tokio::test]
async fn test_pre_cancelled_sync_writes_nothing() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_activity(&server, 1, activity_json(1, "one")).await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1, "", "");

    let token = CancellationToken::new();
    token.cancel();
    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    let outcome = execute(job, &token).await;

    assert!(matches!(outcome, JobOutcome::Cancelled(CancelReason::Signal)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(blobs.put_count(), 0);
    assert_eq!(catalog.update_count(), 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run_leaves_consistent_prefix() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_activity(&server, 1, activity_json(1, "one")).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/activities/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(activity_json(2, "two"))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_activity(&server, 3, activity_json(3, "three")).await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    for id in [1u64, 2, 3] {
        seed(&catalog, id, "", "");
    }

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        canceller.cancel();
    });

    let job = Arc::new(sync_job(&server, &catalog, &blobs));
    let outcome = execute(job, &token).await;
    assert!(matches!(outcome, JobOutcome::Cancelled(CancelReason::Signal)));

    // Let the abandoned in-flight record finish.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!catalog.record(ActivityId(1)).unwrap().data_digest.is_empty());
    assert!(catalog.record(ActivityId(3)).unwrap().data_digest.is_empty());
    assert!(data_pairs_consistent(&catalog, &blobs, &[1, 2, 3]));
}

#[tokio::test]
async fn test_original_marks_missing_once_then_excludes() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_original(&server, 1, "1.fit", b"FIT-ONE").await;
    mount_no_original(&server, 2).await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1, "", "");
    seed(&catalog, 2, "", "");

    let job = Arc::new(original_job(&server, &catalog, &blobs));
    let report = expect_success(execute(job.clone(), &CancellationToken::new()).await);

    assert_eq!(report.written, 1);
    assert_eq!(report.marked_missing, 1);
    assert_eq!(
        catalog.record(ActivityId(2)).unwrap().original_format,
        Some(OriginalFormat::Missing)
    );
    let blob = blobs.object("activities/original/1.fit.gz").unwrap();
    assert_eq!(digest::decompress(&blob).unwrap(), b"FIT-ONE");
    assert_eq!(
        catalog.record(ActivityId(1)).unwrap().original_digest,
        digest::digest(&blob)
    );

    let again = expect_success(execute(job, &CancellationToken::new()).await);
    assert_eq!(again.candidates, 1);
    assert_eq!(again.marked_missing, 0);
    assert_eq!(again.unchanged, 1);

    let export_two = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/activities/2/export_original")
        .count();
    assert_eq!(export_two, 1);
}

#[tokio::test]
async fn test_original_exports_ids_in_ascending_order() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    for id in [5u64, 7, 9] {
        mount_original(&server, id, &format!("{}.fit", id), b"FIT").await;
    }

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    for id in [9u64, 5, 7] {
        seed(&catalog, id, "", "");
    }

    let job = Arc::new(original_job(&server, &catalog, &blobs));
    let report = expect_success(execute(job, &CancellationToken::new()).await);
    assert_eq!(report.written, 3);

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let exported: Vec<String> = requests
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p.ends_with("/export_original"))
        .collect();
    assert_eq!(
        exported,
        vec![
            "/activities/5/export_original",
            "/activities/7/export_original",
            "/activities/9/export_original"
        ]
    );
}

#[tokio::test]
async fn test_original_login_failure_aborts_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1, "", "");

    let job = Arc::new(original_job(&server, &catalog, &blobs));
    let outcome = execute(job, &CancellationToken::new()).await;

    assert!(matches!(outcome, JobOutcome::Failed(AppError::Auth(_))));
    assert_eq!(catalog.update_count(), 0);
}

#[tokio::test]
async fn test_original_unexpected_status_is_hard_failure() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/activities/1/export_original"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_original(&server, 2, "2.gpx", b"<gpx/>").await;

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1, "", "");
    seed(&catalog, 2, "", "");

    let job = Arc::new(original_job(&server, &catalog, &blobs));
    let outcome = execute(job, &CancellationToken::new()).await;

    assert!(matches!(outcome, JobOutcome::Failed(AppError::SourceFetch(_))));
    assert_eq!(blobs.put_count(), 0);
}

fn write_export(dir: &std::path::Path) {
    let header = "Activity ID,Activity Date,Activity Name,Activity Type,Activity Description,\
                  Elapsed Time,Distance,Max Heart Rate,Relative Effort,Commute,\
                  Activity Private Note,Activity Gear,Filename";
    let rows = [
        "1001,\"Mar 1, 2026\",Ride,Ride,,3600,30.1,,,false,,Bike,activities/1001.fit.gz",
        "1002,\"Mar 2, 2026\",Walk,Walk,,1200,2.0,,,false,,,",
        "1000,\"Feb 28, 2026\",Run,Run,,1800,5.0,,,false,,,activities/1000.gpx",
    ];
    std::fs::create_dir_all(dir.join("activities")).unwrap();
    std::fs::write(
        dir.join("activities.csv"),
        format!("{}\n{}\n", header, rows.join("\n")),
    )
    .unwrap();
    std::fs::write(
        dir.join("activities/1001.fit.gz"),
        digest::compress(b"FIT-1001").unwrap(),
    )
    .unwrap();
    std::fs::write(dir.join("activities/1000.gpx"), b"<gpx>1000</gpx>").unwrap();
}

#[tokio::test]
async fn test_from_export_imports_rows_and_originals() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path());

    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();
    seed(&catalog, 1002, "", "");

    let job = Arc::new(FromExport::new(
        dir.path().to_path_buf(),
        Arc::new(catalog.clone()),
        Arc::new(blobs.clone()),
        JobSettings::default(),
    ));
    let report = expect_success(execute(job.clone(), &CancellationToken::new()).await);

    assert_eq!(report.candidates, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.written, 2);
    assert_eq!(
        catalog.record(ActivityId(1001)).unwrap().source,
        RecordSource::Export
    );
    // Pre-existing row keeps its source.
    assert_eq!(
        catalog.record(ActivityId(1002)).unwrap().source,
        RecordSource::Polling
    );
    assert_eq!(
        blobs.keys(),
        vec![
            "activities/original/1000.gpx.gz".to_string(),
            "activities/original/1001.fit.gz".to_string(),
        ]
    );
    let fit = blobs.object("activities/original/1001.fit.gz").unwrap();
    assert_eq!(digest::decompress(&fit).unwrap(), b"FIT-1001");
    assert_eq!(
        catalog.record(ActivityId(1000)).unwrap().original_format,
        Some(OriginalFormat::Gpx)
    );

    let again = expect_success(execute(job, &CancellationToken::new()).await);
    assert_eq!((again.inserted, again.written, again.unchanged), (0, 0, 2));
    assert_eq!(blobs.put_count(), 2);
}

#[tokio::test]
async fn test_from_export_missing_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = MemoryCatalog::new();
    let blobs = MemoryBlobStore::new();

    let job = Arc::new(FromExport::new(
        dir.path().to_path_buf(),
        Arc::new(catalog.clone()),
        Arc::new(blobs),
        JobSettings::default(),
    ));
    let outcome = execute(job, &CancellationToken::new()).await;

    assert!(matches!(outcome, JobOutcome::Failed(AppError::SourceFetch(_))));
    assert!(catalog.is_empty());
}
