//! Job domain types

mod job;
mod request;
mod result;

pub use job::{
    now_millis, Job, JobFilter, JobKind, JobStatus, JobUpdate, Transition, STAGE_QUEUED,
    STAGE_REJECTED, STAGE_REQUEUED,
};
pub use request::{
    validate_content_hash, AnalyzeOptions, AnalyzeRequest, JobRequest, LrcOptions, LrcRequest,
};
pub use result::{AnalyzeResult, JobResult, LrcResult, Phrase, Section};
