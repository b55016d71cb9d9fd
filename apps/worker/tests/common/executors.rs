//! Scripted executors for driving the queue

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chorus_worker::executors::JobExecutor;
use chorus_worker::models::{JobKind, JobRequest, JobResult};
use chorus_worker::queue::ProgressReporter;
use chorus_worker::{WorkerError, WorkerResult};
use tokio::sync::Semaphore;

use super::fixtures::{analyze_result, lrc_result};

fn result_for(kind: JobKind) -> JobResult {
    match kind {
        JobKind::Analyze => analyze_result(),
        JobKind::Lrc => lrc_result(),
    }
}

/// What a [`ScriptedExecutor`] does with every job
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    Fail(String),
    Panic(String),
    /// Succeed with a result of the other kind
    WrongKind,
    /// Fail when the content hash matches, succeed otherwise
    FailHash(String),
    /// Panic when the content hash matches, succeed otherwise
    PanicHash(String),
}

pub struct ScriptedExecutor {
    kind: JobKind,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new(kind: JobKind, script: Script) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn succeeding(kind: JobKind) -> Arc<Self> {
        Self::new(kind, Script::Succeed)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(
        &self,
        request: JobRequest,
        progress: &ProgressReporter,
    ) -> WorkerResult<JobResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress.report(0.5, "working").await;

        match &self.script {
            Script::Succeed => Ok(result_for(self.kind)),
            Script::Fail(message) => Err(WorkerError::Transcription(message.clone())),
            Script::Panic(message) => panic!("{}", message),
            Script::WrongKind => Ok(result_for(match self.kind {
                JobKind::Analyze => JobKind::Lrc,
                JobKind::Lrc => JobKind::Analyze,
            })),
            Script::FailHash(hash) if request.content_hash() == hash => {
                Err(WorkerError::AudioAnalysis(format!("cannot analyze {}", hash)))
            }
            Script::PanicHash(hash) if request.content_hash() == hash => {
                panic!("executor blew up on {}", hash)
            }
            Script::FailHash(_) | Script::PanicHash(_) => Ok(result_for(self.kind)),
        }
    }
}

/// Executor that blocks every job until the test releases it, recording
/// how many run at once and in which order they started
pub struct GatedExecutor {
    kind: JobKind,
    gate: Semaphore,
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: Mutex<Vec<String>>,
}

impl GatedExecutor {
    pub fn new(kind: JobKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            gate: Semaphore::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        })
    }

    /// Let `n` blocked (or future) jobs finish
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Content hashes in the order their jobs started
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobExecutor for GatedExecutor {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(
        &self,
        request: JobRequest,
        progress: &ProgressReporter,
    ) -> WorkerResult<JobResult> {
        self.started
            .lock()
            .unwrap()
            .push(request.content_hash().to_string());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        progress.report(0.1, "waiting").await;
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(result_for(self.kind))
    }
}
