//! Job store integration tests
//!
//! Runs against a SQLite file in a temporary directory:
//! - insert/get round trip with kind-keyed decoding
//! - atomic updates keeping the result/error invariants
//! - listing order, filters and limits
//! - recovery and retention queries

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use chorus_worker::models::{
    Job, JobFilter, JobKind, JobStatus, JobUpdate, STAGE_QUEUED, STAGE_REQUEUED,
};
use chorus_worker::repositories::StoreError;
use common::*;
use uuid::Uuid;

#[tokio::test]
async fn test_insert_and_get_round_trip() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(lrc_request("song1"));

    store.insert_job(&job).await.unwrap();
    let loaded = store.get_job(job.id).await.unwrap().unwrap();

    assert_eq!(loaded, job);
    assert_eq!(loaded.kind, JobKind::Lrc);
    assert_eq!(loaded.stage, STAGE_QUEUED);
}

#[tokio::test]
async fn test_get_unknown_job_is_none() {
    let (store, _dir) = temp_store().await;
    assert!(store.get_job(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_insert_is_rejected() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(analyze_request("dup"));

    store.insert_job(&job).await.unwrap();
    let err = store.insert_job(&job).await.unwrap_err();

    assert_matches!(err, StoreError::Duplicate(id) if id == job.id);
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(analyze_request("keep"));
    store.insert_job(&job).await.unwrap();

    store.initialize().await.unwrap();
    store.initialize().await.unwrap();

    assert!(store.get_job(job.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_lifecycle_keeps_invariants() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(analyze_request("life"));
    store.insert_job(&job).await.unwrap();

    let processing = store.update_job(job.id, &JobUpdate::processing()).await.unwrap();
    assert_eq!(processing.status, JobStatus::Processing);
    assert!(processing.updated_at >= job.updated_at);
    assert_eq!(processing.created_at, job.created_at);

    let progressed = store
        .update_job(job.id, &JobUpdate::progress(0.4, "analyzing"))
        .await
        .unwrap();
    assert_eq!(progressed.status, JobStatus::Processing);
    assert_eq!(progressed.progress, 0.4);
    assert_eq!(progressed.stage, "analyzing");

    let done = store
        .update_job(job.id, &JobUpdate::completed(analyze_result()))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 1.0);
    assert_eq!(done.result, Some(analyze_result()));
    assert!(done.error_message.is_none());

    // The row returned by the update is what a later read sees
    assert_eq!(store.get_job(job.id).await.unwrap().unwrap(), done);
}

#[tokio::test]
async fn test_failed_update_sets_message_and_clears_result() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(lrc_request("bad"));
    store.insert_job(&job).await.unwrap();

    let failed = store
        .update_job(job.id, &JobUpdate::failed("transcription failed: boom"))
        .await
        .unwrap();

    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("transcription failed: boom"));
    assert!(failed.result.is_none());
}

#[tokio::test]
async fn test_progress_is_clamped_by_store() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(lrc_request("clamp"));
    store.insert_job(&job).await.unwrap();

    let updated = store
        .update_job(job.id, &JobUpdate::progress(3.5, "overshoot"))
        .await
        .unwrap();
    assert_eq!(updated.progress, 1.0);
}

#[tokio::test]
async fn test_update_unknown_job_is_not_found() {
    let (store, _dir) = temp_store().await;
    let id = Uuid::new_v4();

    let err = store.update_job(id, &JobUpdate::processing()).await.unwrap_err();
    assert_matches!(err, StoreError::NotFound(missing) if missing == id);
}

#[tokio::test]
async fn test_finished_jobs_cannot_be_reopened() {
    let (store, _dir) = temp_store().await;
    let done = Job::new(analyze_request("done"));
    let failed = Job::new(lrc_request("failed"));
    store.insert_job(&done).await.unwrap();
    store.insert_job(&failed).await.unwrap();

    let completed = store
        .update_job(done.id, &JobUpdate::completed(analyze_result()))
        .await
        .unwrap();
    store
        .update_job(failed.id, &JobUpdate::failed("boom"))
        .await
        .unwrap();

    for update in [
        JobUpdate::progress(0.3, "late report"),
        JobUpdate::processing(),
        JobUpdate::requeue(),
        JobUpdate::failed("second verdict"),
    ] {
        let err = store.update_job(done.id, &update).await.unwrap_err();
        assert_matches!(
            err,
            StoreError::Finished { id, status: JobStatus::Completed } if id == done.id
        );
    }
    let err = store
        .update_job(failed.id, &JobUpdate::completed(analyze_result()))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Finished { status: JobStatus::Failed, .. });

    assert_eq!(store.get_job(done.id).await.unwrap().unwrap(), completed);
    let still_failed = store.get_job(failed.id).await.unwrap().unwrap();
    assert_eq!(still_failed.status, JobStatus::Failed);
    assert_eq!(still_failed.error_message.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_list_newest_first_with_filters_and_limit() {
    let (store, _dir) = temp_store().await;

    let mut ids = Vec::new();
    for (i, request) in [
        analyze_request("a1"),
        lrc_request("l1"),
        analyze_request("a2"),
        lrc_request("l2"),
    ]
    .into_iter()
    .enumerate()
    {
        let mut job = Job::new(request);
        job.created_at = job.created_at + chrono::Duration::milliseconds(i as i64);
        job.updated_at = job.created_at;
        store.insert_job(&job).await.unwrap();
        ids.push(job.id);
    }
    store
        .update_job(ids[1], &JobUpdate::failed("nope"))
        .await
        .unwrap();

    let all = store.list_jobs(&JobFilter::default()).await.unwrap();
    let listed: Vec<Uuid> = all.iter().map(|j| j.id).collect();
    assert_eq!(listed, vec![ids[3], ids[2], ids[1], ids[0]]);

    let lrc = store.list_jobs(&JobFilter::kind(JobKind::Lrc)).await.unwrap();
    assert_eq!(lrc.iter().map(|j| j.id).collect::<Vec<_>>(), vec![ids[3], ids[1]]);

    let failed = store
        .list_jobs(&JobFilter::status(JobStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, ids[1]);

    let limited = store
        .list_jobs(&JobFilter::default().with_limit(2))
        .await
        .unwrap();
    assert_eq!(limited.iter().map(|j| j.id).collect::<Vec<_>>(), vec![ids[3], ids[2]]);
}

#[tokio::test]
async fn test_list_ties_are_stable() {
    let (store, _dir) = temp_store().await;
    let stamp = chorus_worker::models::now_millis();

    let mut ids = Vec::new();
    for hash in ["t1", "t2", "t3"] {
        let mut job = Job::new(analyze_request(hash));
        job.created_at = stamp;
        job.updated_at = stamp;
        store.insert_job(&job).await.unwrap();
        ids.push(job.id);
    }

    let first: Vec<Uuid> = store
        .list_jobs(&JobFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|j| j.id)
        .collect();
    let second: Vec<Uuid> = store
        .list_jobs(&JobFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|j| j.id)
        .collect();

    assert_eq!(first, vec![ids[2], ids[1], ids[0]]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_interrupted_jobs_oldest_first() {
    let (store, _dir) = temp_store().await;

    let mut ids = Vec::new();
    for (i, hash) in ["q1", "p1", "c1", "q2"].iter().enumerate() {
        let mut job = Job::new(analyze_request(hash));
        job.created_at = job.created_at + chrono::Duration::milliseconds(i as i64);
        store.insert_job(&job).await.unwrap();
        ids.push(job.id);
    }
    store.update_job(ids[1], &JobUpdate::processing()).await.unwrap();
    store
        .update_job(ids[2], &JobUpdate::completed(analyze_result()))
        .await
        .unwrap();

    let interrupted = store.get_interrupted_jobs().await.unwrap();
    assert_eq!(
        interrupted.iter().map(|j| j.id).collect::<Vec<_>>(),
        vec![ids[0], ids[1], ids[3]]
    );

    let requeued = store.update_job(ids[1], &JobUpdate::requeue()).await.unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.stage, STAGE_REQUEUED);
    assert_eq!(requeued.progress, 0.0);
}

#[tokio::test]
async fn test_purge_removes_only_old_terminal_jobs() {
    let (store, _dir) = temp_store().await;
    let long_ago = chorus_worker::models::now_millis() - chrono::Duration::days(30);

    let mut old_completed = Job::new(analyze_request("old-done"));
    old_completed.status = JobStatus::Completed;
    old_completed.result = Some(analyze_result());
    old_completed.updated_at = long_ago;

    let mut old_failed = Job::new(lrc_request("old-failed"));
    old_failed.status = JobStatus::Failed;
    old_failed.error_message = Some("boom".into());
    old_failed.updated_at = long_ago;

    let mut old_queued = Job::new(analyze_request("old-queued"));
    old_queued.updated_at = long_ago;

    let mut old_processing = Job::new(lrc_request("old-processing"));
    old_processing.status = JobStatus::Processing;
    old_processing.updated_at = long_ago;

    let mut recent_completed = Job::new(analyze_request("recent-done"));
    recent_completed.status = JobStatus::Completed;
    recent_completed.result = Some(analyze_result());

    for job in [
        &old_completed,
        &old_failed,
        &old_queued,
        &old_processing,
        &recent_completed,
    ] {
        store.insert_job(job).await.unwrap();
    }

    let purged = store
        .purge_old_jobs(Duration::from_secs(7 * 24 * 60 * 60))
        .await
        .unwrap();
    assert_eq!(purged, 2);

    assert!(store.get_job(old_completed.id).await.unwrap().is_none());
    assert!(store.get_job(old_failed.id).await.unwrap().is_none());
    assert!(store.get_job(old_queued.id).await.unwrap().is_some());
    assert!(store.get_job(old_processing.id).await.unwrap().is_some());
    assert!(store.get_job(recent_completed.id).await.unwrap().is_some());

    // Nothing left to purge
    assert_eq!(
        store
            .purge_old_jobs(Duration::from_secs(7 * 24 * 60 * 60))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_corrupt_row_is_reported() {
    let (store, _dir) = temp_store().await;
    let job = Job::new(analyze_request("corrupt"));
    store.insert_job(&job).await.unwrap();

    sqlx::query("UPDATE jobs SET kind = 'karaoke' WHERE id = ?")
        .bind(job.id.to_string())
        .execute(store.pool())
        .await
        .unwrap();

    let err = store.get_job(job.id).await.unwrap_err();
    assert_matches!(err, StoreError::Corrupt(_));
}

#[tokio::test]
async fn test_ping_and_close() {
    let (store, _dir) = temp_store().await;
    store.ping().await.unwrap();
    assert!(!store.is_closed());

    store.close().await;
    assert!(store.is_closed());
    assert!(store.ping().await.is_err());
}

#[tokio::test]
async fn test_store_over_existing_pool() {
    // One connection, or every pooled connection gets its own in-memory database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = chorus_worker::JobStore::from_pool(pool);
    store.initialize().await.unwrap();

    let job = Job::new(analyze_request("pooled"));
    store.insert_job(&job).await.unwrap();
    assert_eq!(store.get_job(job.id).await.unwrap().unwrap(), job);
}
