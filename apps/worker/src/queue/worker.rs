//! Per-kind dispatch loop and the job run it spawns

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::{JobIndex, ProgressReporter};
use crate::error::WorkerError;
use crate::executors::JobExecutor;
use crate::models::{Job, JobKind, JobUpdate};
use crate::repositories::JobStore;

/// What a worker needs to run jobs of one kind
#[derive(Clone)]
pub(super) struct WorkerContext {
    pub kind: JobKind,
    pub store: JobStore,
    pub index: Arc<JobIndex>,
    pub executor: Arc<dyn JobExecutor>,
}

/// Take a permit, then a job, then hand both to a worker task.
///
/// Taking the permit first means a job leaves the channel only when a worker
/// slot is free, so jobs still waiting are never held by a blocked task.
pub(super) async fn dispatch_loop(
    ctx: WorkerContext,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    debug!(kind = %ctx.kind, "Dispatcher started");

    loop {
        let permit: OwnedSemaphorePermit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let ctx = ctx.clone();
        tracker.spawn(async move {
            run_job(ctx, job).await;
            drop(permit);
        });
    }

    debug!(kind = %ctx.kind, "Dispatcher stopped");
}

/// Run one job: mark it Processing, execute, persist the outcome.
///
/// Nothing here propagates: every failure ends up either in the job row or
/// in the log, so the pool keeps serving the next job.
async fn run_job(ctx: WorkerContext, job: Job) {
    let id = job.id;
    let started = Instant::now();

    let job = match ctx.store.update_job(id, &JobUpdate::processing()).await {
        Ok(job) => job,
        Err(e) => {
            error!(job_id = %id, kind = %ctx.kind, error = %e, "Failed to mark job processing");
            return;
        }
    };
    ctx.index.insert(job.clone());
    info!(job_id = %id, kind = %ctx.kind, "Job started");

    let reporter = ProgressReporter::new(id, ctx.store.clone(), Arc::clone(&ctx.index), job.progress);
    let executor = Arc::clone(&ctx.executor);
    let request = job.request.clone();

    // Separate task so a panic unwinds there and comes back as a JoinError
    let outcome =
        tokio::spawn(async move { executor.execute(request, &reporter).await }).await;

    let update = match outcome {
        Ok(Ok(result)) if result.kind() == job.kind => JobUpdate::completed(result),
        Ok(Ok(result)) => JobUpdate::failed(format!(
            "executor returned a {} result for a {} job",
            result.kind(),
            job.kind
        )),
        Ok(Err(e)) => {
            e.log();
            JobUpdate::failed(e.to_string())
        }
        Err(join_error) if join_error.is_panic() => {
            let e = WorkerError::ExecutorPanic(panic_message(join_error.into_panic()));
            e.log();
            JobUpdate::failed(e.to_string())
        }
        Err(join_error) => JobUpdate::failed(format!("executor task aborted: {}", join_error)),
    };

    match ctx.store.update_job(id, &update).await {
        Ok(job) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &job.error_message {
                None => info!(job_id = %id, kind = %ctx.kind, elapsed_ms, "Job completed"),
                Some(message) => warn!(
                    job_id = %id,
                    kind = %ctx.kind,
                    elapsed_ms,
                    error = %message,
                    "Job failed"
                ),
            }
            ctx.index.insert(job);
        }
        Err(e) => error!(
            job_id = %id,
            kind = %ctx.kind,
            error = %e,
            "Failed to persist job outcome; job stays processing until restart"
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
