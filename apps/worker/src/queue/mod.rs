//! Durable job queue
//!
//! [`JobQueue`] admits jobs, persists them through [`JobStore`], and runs
//! them on one bounded pool per [`JobKind`]. Lifecycle:
//!
//! 1. [`JobQueue::new`] wires the store, executors and channels.
//! 2. [`JobQueue::initialize`] prepares the schema, purges expired terminal
//!    jobs and requeues work interrupted by the previous process, ahead of
//!    anything submitted later.
//! 3. [`JobQueue::start`] spawns the dispatchers and the index sweeper.
//! 4. [`JobQueue::stop`] halts dispatch, waits a grace period for running
//!    jobs, then closes the store. Jobs still running are left Processing and
//!    are requeued by the next `initialize`.

mod index;
mod progress;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use index::JobIndex;
pub use progress::ProgressReporter;

use crate::error::{WorkerError, WorkerResult};
use crate::executors::JobExecutors;
use crate::models::{now_millis, Job, JobFilter, JobKind, JobRequest, JobUpdate};
use crate::repositories::JobStore;
use worker::{dispatch_loop, WorkerContext};

/// Queue tuning
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Analysis jobs running at once
    pub max_concurrent_analysis: usize,
    /// Synced-lyrics jobs running at once
    pub max_concurrent_lrc: usize,
    /// Age after which terminal jobs are purged at startup
    pub retention: Duration,
    /// How long `stop` waits for running jobs
    pub shutdown_grace: Duration,
    /// How long a terminal job stays in the in-memory index
    pub index_eviction_grace: Duration,
    pub index_sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_analysis: 1,
            max_concurrent_lrc: 1,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            shutdown_grace: Duration::from_secs(30),
            index_eviction_grace: Duration::from_secs(300),
            index_sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Channel and worker slots of one job kind
struct Lane {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Lane {
    fn new(max_concurrent: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            max_concurrent: self.max_concurrent,
            in_flight: self
                .max_concurrent
                .saturating_sub(self.permits.available_permits()),
        }
    }
}

/// What `initialize` found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Terminal jobs removed by retention
    pub purged: u64,
    /// Interrupted jobs put back in line
    pub requeued: usize,
}

/// Occupancy of one worker pool
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub max_concurrent: usize,
    pub in_flight: usize,
}

/// Queue snapshot for health reporting
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub analyze: PoolStats,
    pub lrc: PoolStats,
    pub indexed_jobs: usize,
    pub started: bool,
    pub stopped: bool,
}

pub struct JobQueue {
    store: JobStore,
    index: Arc<JobIndex>,
    executors: JobExecutors,
    config: QueueConfig,
    analyze: Lane,
    lrc: Lane,
    initialized: AtomicBool,
    started: AtomicBool,
    stopped: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl JobQueue {
    pub fn new(store: JobStore, executors: JobExecutors, config: QueueConfig) -> Self {
        Self {
            analyze: Lane::new(config.max_concurrent_analysis.max(1)),
            lrc: Lane::new(config.max_concurrent_lrc.max(1)),
            store,
            index: Arc::new(JobIndex::new()),
            executors,
            config,
            initialized: AtomicBool::new(false),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    fn lane(&self, kind: JobKind) -> &Lane {
        match kind {
            JobKind::Analyze => &self.analyze,
            JobKind::Lrc => &self.lrc,
        }
    }

    fn enqueue(&self, job: Job) -> WorkerResult<()> {
        self.lane(job.kind)
            .sender
            .send(job)
            .map_err(|_| WorkerError::QueueStopped)
    }

    /// Prepare the store and requeue interrupted jobs. Runs once, before
    /// any `submit`.
    pub async fn initialize(&self) -> WorkerResult<StartupReport> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::QueueStopped);
        }
        if self.initialized.load(Ordering::SeqCst) {
            return Err(WorkerError::QueueAlreadyInitialized);
        }

        self.store.initialize().await?;
        let purged = self.store.purge_old_jobs(self.config.retention).await?;

        // Every row is requeued before anything reaches a lane, so a failed
        // attempt can be retried without enqueueing a job twice.
        let interrupted = self.store.get_interrupted_jobs().await?;
        let mut recovered = Vec::with_capacity(interrupted.len());
        for job in interrupted {
            debug!(job_id = %job.id, kind = %job.kind, was = %job.status, "Requeueing interrupted job");
            recovered.push(self.store.update_job(job.id, &JobUpdate::requeue()).await?);
        }

        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::QueueAlreadyInitialized);
        }
        let requeued = recovered.len();
        for job in recovered {
            self.index.insert(job.clone());
            self.enqueue(job)?;
        }
        info!(purged, requeued, "Job queue initialized");
        Ok(StartupReport { purged, requeued })
    }

    /// Spawn one dispatcher per kind and the index sweeper
    pub async fn start(&self) -> WorkerResult<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(WorkerError::QueueNotInitialized);
        }
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::QueueStopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::QueueAlreadyStarted);
        }

        for kind in JobKind::ALL {
            let lane = self.lane(kind);
            let receiver = lane.receiver.lock().await.take().ok_or_else(|| {
                WorkerError::Internal(format!("{} dispatcher already running", kind))
            })?;
            let ctx = WorkerContext {
                kind,
                store: self.store.clone(),
                index: Arc::clone(&self.index),
                executor: self.executors.get(kind),
            };

            self.tracker.spawn(dispatch_loop(
                ctx,
                receiver,
                Arc::clone(&lane.permits),
                self.shutdown.clone(),
                self.tracker.clone(),
            ));
        }

        self.tracker.spawn(sweep_index(
            Arc::clone(&self.index),
            self.config.index_eviction_grace,
            self.config.index_sweep_interval,
            self.shutdown.clone(),
        ));

        info!(
            max_concurrent_analysis = self.analyze.max_concurrent,
            max_concurrent_lrc = self.lrc.max_concurrent,
            "Job queue started"
        );
        Ok(())
    }

    /// Admit a job and return it without waiting for it to run.
    ///
    /// A request that fails validation is stored as Failed with stage
    /// "rejected" and returned like any other job.
    pub async fn submit(&self, request: JobRequest) -> WorkerResult<Job> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkerError::QueueStopped);
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(WorkerError::QueueNotInitialized);
        }

        if let Err(e) = request.validate() {
            let job = Job::rejected(request, e.to_string());
            self.store.insert_job(&job).await?;
            warn!(job_id = %job.id, kind = %job.kind, error = %e, "Job rejected");
            self.index.insert(job.clone());
            return Ok(job);
        }

        let job = Job::new(request);
        self.store.insert_job(&job).await?;
        self.index.insert(job.clone());
        self.enqueue(job.clone())?;

        info!(job_id = %job.id, kind = %job.kind, "Job submitted");
        Ok(job)
    }

    /// Look a job up in the index, falling back to the store
    pub async fn get_job(&self, id: Uuid) -> WorkerResult<Option<Job>> {
        if let Some(job) = self.index.get(id) {
            return Ok(Some(job));
        }
        Ok(self.store.get_job(id).await?)
    }

    /// List jobs from the store
    pub async fn list_jobs(&self, filter: &JobFilter) -> WorkerResult<Vec<Job>> {
        Ok(self.store.list_jobs(filter).await?)
    }

    /// Halt dispatch, wait for running jobs up to the grace period, close
    /// the store. Calling it again does nothing.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Stopping job queue");
        self.shutdown.cancel();
        self.tracker.close();

        if tokio::time::timeout(self.config.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            let stats = self.stats();
            warn!(
                analyze_in_flight = stats.analyze.in_flight,
                lrc_in_flight = stats.lrc.in_flight,
                grace_secs = self.config.shutdown_grace.as_secs_f64(),
                "Grace period elapsed; abandoning running jobs"
            );
        }

        self.store.close().await;
        info!("Job queue stopped");
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            analyze: self.analyze.stats(),
            lrc: self.lrc.stats(),
            indexed_jobs: self.index.len(),
            started: self.started.load(Ordering::SeqCst),
            stopped: self.stopped.load(Ordering::SeqCst),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// The in-memory index; exposed so callers can evict entries by hand
    pub fn index(&self) -> &JobIndex {
        &self.index
    }
}

/// Periodically drop terminal jobs from the index
async fn sweep_index(
    index: Arc<JobIndex>,
    grace: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
                let cutoff = now_millis()
                    .checked_sub_signed(grace)
                    .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
                let evicted = index.evict_terminal_before(cutoff);
                if evicted > 0 {
                    debug!(evicted, remaining = index.len(), "Evicted finished jobs from index");
                }
            }
        }
    }
}
