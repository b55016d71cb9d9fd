//! Requests, results, stores and queues for integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chorus_shared_config::DatabaseConfig;
use chorus_worker::executors::{JobExecutor, JobExecutors};
use chorus_worker::models::{
    AnalyzeOptions, AnalyzeRequest, AnalyzeResult, Job, JobRequest, JobResult, JobStatus,
    LrcOptions, LrcRequest, LrcResult, Phrase, Section,
};
use chorus_worker::{JobQueue, JobStore, QueueConfig};
use tempfile::TempDir;
use uuid::Uuid;

pub const LYRICS: &str = "[Verse 1]\nFirst line of the song\nSecond line here\n\n[Chorus]\nSing it loud\n";

pub fn analyze_request(hash: &str) -> JobRequest {
    JobRequest::Analyze(AnalyzeRequest {
        audio_url: format!("/music/{}.flac", hash),
        content_hash: hash.to_string(),
        options: AnalyzeOptions::default(),
    })
}

pub fn lrc_request(hash: &str) -> JobRequest {
    JobRequest::Lrc(LrcRequest {
        audio_url: format!("/music/{}.flac", hash),
        content_hash: hash.to_string(),
        lyrics_text: LYRICS.to_string(),
        options: LrcOptions::default(),
    })
}

pub fn analyze_result() -> JobResult {
    JobResult::Analyze(AnalyzeResult {
        duration_seconds: 200.0,
        tempo_bpm: 128.0,
        musical_key: "C".into(),
        musical_mode: "major".into(),
        key_confidence: 0.9,
        loudness_db: -8.0,
        beats: vec![0.0, 0.47, 0.94],
        downbeats: vec![0.0],
        sections: vec![Section {
            start: 0.0,
            end: 200.0,
            label: "verse".into(),
        }],
        stems_url: None,
    })
}

pub fn lrc_result() -> JobResult {
    JobResult::Lrc(LrcResult {
        lrc_file_path: "/tmp/out.lrc".into(),
        line_count: 3,
        phrases: vec![Phrase {
            start: 1.0,
            end: 2.0,
            text: "first line".into(),
        }],
    })
}

/// Store backed by a SQLite file in a fresh temporary directory
pub async fn temp_store() -> (JobStore, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(dir.path()).await;
    (store, dir)
}

/// Open (or reopen) the store file inside `dir` with its schema in place
pub async fn open_store(dir: &Path) -> JobStore {
    let store = JobStore::connect(&DatabaseConfig::for_file(dir.join("jobs.db")))
        .await
        .expect("connect store");
    store.initialize().await.expect("initialize store");
    store
}

pub fn test_queue_config(max_analysis: usize, max_lrc: usize) -> QueueConfig {
    QueueConfig {
        max_concurrent_analysis: max_analysis,
        max_concurrent_lrc: max_lrc,
        shutdown_grace: Duration::from_secs(2),
        index_sweep_interval: Duration::from_millis(50),
        ..QueueConfig::default()
    }
}

pub fn executors(analyze: Arc<dyn JobExecutor>, lrc: Arc<dyn JobExecutor>) -> JobExecutors {
    JobExecutors::new(analyze, lrc).expect("executors match their kinds")
}

/// Queue over `store`, initialized and started
pub async fn running_queue(store: JobStore, executors: JobExecutors, config: QueueConfig) -> Arc<JobQueue> {
    let queue = Arc::new(JobQueue::new(store, executors, config));
    queue.initialize().await.expect("initialize queue");
    queue.start().await.expect("start queue");
    queue
}

/// Poll until the job reaches a terminal status
pub async fn wait_for_terminal(queue: &JobQueue, id: Uuid) -> Job {
    wait_for(queue, id, |job| job.status.is_terminal()).await
}

/// Poll until `pred` holds for the job, panicking after five seconds
pub async fn wait_for(queue: &JobQueue, id: Uuid, pred: impl Fn(&Job) -> bool) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = queue.get_job(id).await.expect("get_job") {
            if pred(&job) {
                return job;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {} did not reach the expected state in time", id);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until `cond` holds, panicking after five seconds
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn assert_terminal_invariants(job: &Job) {
    match job.status {
        JobStatus::Completed => {
            assert!(job.result.is_some(), "completed job without result");
            assert!(job.error_message.is_none(), "completed job with error");
        }
        JobStatus::Failed => {
            assert!(job.result.is_none(), "failed job with result");
            assert!(
                job.error_message.as_deref().is_some_and(|m| !m.is_empty()),
                "failed job without message"
            );
        }
        other => panic!("job {} is not terminal: {}", job.id, other),
    }
}
