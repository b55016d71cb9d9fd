//! Job record, lifecycle enums and partial updates

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JobRequest, JobResult};

/// Job type; each kind has its own worker pool and payload shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Tempo, key, sections and optional stems
    Analyze,
    /// Line-synced lyrics
    Lrc,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Analyze, JobKind::Lrc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Lrc => "lrc",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyze" => Ok(Self::Analyze),
            "lrc" => Ok(Self::Lrc),
            other => Err(format!("unknown job kind '{}'", other)),
        }
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and Failed never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Stage label of a freshly submitted job
pub const STAGE_QUEUED: &str = "queued";
/// Stage label of a job reset by startup recovery
pub const STAGE_REQUEUED: &str = "requeued";
/// Stage label of a job that failed validation at submit
pub const STAGE_REJECTED: &str = "rejected";

/// Current time at the precision the store keeps (milliseconds)
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// One durably tracked unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub request: JobRequest,
    /// Fraction done, in [0, 1]
    pub progress: f64,
    pub stage: String,
    /// Set iff `status == Failed`
    pub error_message: Option<String>,
    /// Set iff `status == Completed`
    pub result: Option<JobResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// New Queued job; the kind follows the request variant
    pub fn new(request: JobRequest) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            kind: request.kind(),
            status: JobStatus::Queued,
            request,
            progress: 0.0,
            stage: STAGE_QUEUED.to_string(),
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Job that failed validation; it is terminal from the start
    pub fn rejected(request: JobRequest, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            stage: STAGE_REJECTED.to_string(),
            error_message: Some(message.into()),
            ..Self::new(request)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Status change carried by a [`JobUpdate`]
///
/// Each variant fixes status, result and error message together, so no
/// update can leave a row that is Completed without a result or Failed
/// without a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Queued,
    Processing,
    Completed(JobResult),
    Failed(String),
}

impl Transition {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Queued => JobStatus::Queued,
            Self::Processing => JobStatus::Processing,
            Self::Completed(_) => JobStatus::Completed,
            Self::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Partial update of a job row; `updated_at` is always refreshed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub transition: Option<Transition>,
    pub progress: Option<f64>,
    pub stage: Option<String>,
}

impl JobUpdate {
    /// Reset an interrupted job for another attempt
    pub fn requeue() -> Self {
        Self {
            transition: Some(Transition::Queued),
            progress: Some(0.0),
            stage: Some(STAGE_REQUEUED.to_string()),
        }
    }

    /// A worker took ownership of the job
    pub fn processing() -> Self {
        Self {
            transition: Some(Transition::Processing),
            progress: None,
            stage: Some("processing".to_string()),
        }
    }

    pub fn completed(result: JobResult) -> Self {
        Self {
            transition: Some(Transition::Completed(result)),
            progress: Some(1.0),
            stage: Some("completed".to_string()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            transition: Some(Transition::Failed(message.into())),
            progress: None,
            stage: Some("failed".to_string()),
        }
    }

    /// Progress report from a running executor
    pub fn progress(progress: f64, stage: impl Into<String>) -> Self {
        Self {
            transition: None,
            progress: Some(progress),
            stage: Some(stage.into()),
        }
    }
}

/// Filter for listing jobs; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    pub limit: Option<u32>,
}

impl JobFilter {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn kind(kind: JobKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalyzeOptions, AnalyzeRequest};

    fn analyze_request() -> JobRequest {
        JobRequest::Analyze(AnalyzeRequest {
            audio_url: "file:///music/song.flac".to_string(),
            content_hash: "abc123".to_string(),
            options: AnalyzeOptions::default(),
        })
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new(analyze_request());
        assert_eq!(job.kind, JobKind::Analyze);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert_eq!(job.created_at, job.updated_at);
        assert_eq!(job.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
        assert!(job.result.is_none() && job.error_message.is_none());
    }

    #[test]
    fn test_rejected_job_is_failed_with_message() {
        let job = Job::rejected(analyze_request(), "audio_url is empty");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, STAGE_REJECTED);
        assert_eq!(job.error_message.as_deref(), Some("audio_url is empty"));
        assert!(job.result.is_none());
    }

    #[test]
    fn test_enum_string_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("LRC".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_requeue_update() {
        let update = JobUpdate::requeue();
        assert_eq!(update.transition, Some(Transition::Queued));
        assert_eq!(update.progress, Some(0.0));
        assert_eq!(update.stage.as_deref(), Some(STAGE_REQUEUED));
    }

    #[test]
    fn test_job_serializes_with_lowercase_enums() {
        let json = serde_json::to_value(Job::new(analyze_request())).unwrap();
        assert_eq!(json["kind"], "analyze");
        assert_eq!(json["status"], "queued");
        assert_eq!(json["request"]["kind"], "analyze");
    }
}
