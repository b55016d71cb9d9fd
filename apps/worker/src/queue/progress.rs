//! Progress side channel handed to executors

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::JobIndex;
use crate::models::JobUpdate;
use crate::repositories::JobStore;

/// Persists `(progress, stage)` pairs for one running job.
///
/// Values are clamped to `[0, 1]` and never go backwards. Progress is
/// advisory: a failed write is logged and the executor carries on.
pub struct ProgressReporter {
    job_id: Uuid,
    sink: Option<(JobStore, Arc<JobIndex>)>,
    last: Mutex<f64>,
}

impl ProgressReporter {
    pub(crate) fn new(job_id: Uuid, store: JobStore, index: Arc<JobIndex>, start: f64) -> Self {
        Self {
            job_id,
            sink: Some((store, index)),
            last: Mutex::new(start.clamp(0.0, 1.0)),
        }
    }

    /// Reporter that only tracks values, for running an executor outside a queue
    pub fn detached(job_id: Uuid) -> Self {
        Self {
            job_id,
            sink: None,
            last: Mutex::new(0.0),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Record that the job reached `progress` while doing `stage`
    pub async fn report(&self, progress: f64, stage: &str) {
        let mut last = self.last.lock().await;
        let value = if progress.is_finite() {
            progress.clamp(0.0, 1.0).max(*last)
        } else {
            *last
        };
        *last = value;

        debug!(job_id = %self.job_id, progress = value, stage, "Job progress");

        if let Some((store, index)) = &self.sink {
            match store
                .update_job(self.job_id, &JobUpdate::progress(value, stage))
                .await
            {
                Ok(job) => index.insert(job),
                Err(e) => warn!(
                    job_id = %self.job_id,
                    stage,
                    error = %e,
                    "Failed to persist job progress"
                ),
            }
        }
    }

    /// Last reported value
    pub async fn current(&self) -> f64 {
        *self.last.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_shared_config::DatabaseConfig;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_progress_is_clamped_and_monotonic() {
        let reporter = ProgressReporter::detached(Uuid::new_v4());

        reporter.report(0.4, "transcribing").await;
        assert_eq!(reporter.current().await, 0.4);

        reporter.report(0.2, "late report").await;
        assert_eq!(reporter.current().await, 0.4);

        reporter.report(f64::NAN, "garbage").await;
        assert_eq!(reporter.current().await, 0.4);

        reporter.report(7.0, "overshoot").await;
        assert_eq!(reporter.current().await, 1.0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_write_is_logged_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::connect(&DatabaseConfig::for_file(dir.path().join("jobs.db")))
            .await
            .unwrap();
        store.initialize().await.unwrap();
        let index = Arc::new(JobIndex::new());

        // No such row, so every write fails
        let reporter = ProgressReporter::new(Uuid::new_v4(), store, index.clone(), 0.0);
        reporter.report(0.5, "analyzing").await;

        assert_eq!(reporter.current().await, 0.5);
        assert!(index.is_empty());
        assert!(logs_contain("Failed to persist job progress"));
    }
}
