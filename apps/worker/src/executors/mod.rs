//! Job executors
//!
//! An executor turns one request of its kind into a result, reporting
//! progress on the way. The queue may run several invocations of the same
//! executor at once, so implementations keep no per-job mutable state.

mod analyze;
mod lrc;

use std::sync::Arc;

use async_trait::async_trait;

pub use analyze::AnalyzeExecutor;
pub use lrc::{LrcExecutor, LrcExecutorConfig};

use crate::error::{WorkerError, WorkerResult};
use crate::models::{JobKind, JobRequest, JobResult};
use crate::queue::ProgressReporter;

/// Pluggable per-kind job implementation
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Kind of job this executor handles
    fn kind(&self) -> JobKind;

    /// Run one job to completion
    async fn execute(
        &self,
        request: JobRequest,
        progress: &ProgressReporter,
    ) -> WorkerResult<JobResult>;
}

/// One executor per job kind
#[derive(Clone)]
pub struct JobExecutors {
    analyze: Arc<dyn JobExecutor>,
    lrc: Arc<dyn JobExecutor>,
}

impl JobExecutors {
    /// Pair up executors, checking each handles the kind it is registered for
    pub fn new(analyze: Arc<dyn JobExecutor>, lrc: Arc<dyn JobExecutor>) -> WorkerResult<Self> {
        for (expected, executor) in [(JobKind::Analyze, &analyze), (JobKind::Lrc, &lrc)] {
            if executor.kind() != expected {
                return Err(WorkerError::Configuration(format!(
                    "{} executor registered for {} jobs",
                    executor.kind(),
                    expected
                )));
            }
        }
        Ok(Self { analyze, lrc })
    }

    pub fn get(&self, kind: JobKind) -> Arc<dyn JobExecutor> {
        match kind {
            JobKind::Analyze => Arc::clone(&self.analyze),
            JobKind::Lrc => Arc::clone(&self.lrc),
        }
    }
}

/// Error for a request routed to the wrong executor
fn wrong_request(expected: JobKind, request: &JobRequest) -> WorkerError {
    WorkerError::InvalidPayload(format!(
        "{} executor received a {} request",
        expected,
        request.kind()
    ))
}
