//! Chorus worker
//!
//! Durable job orchestration for long-running media work: song analysis and
//! synced-lyrics (LRC) generation. Jobs are persisted in SQLite, run on
//! bounded per-kind worker pools, recovered after a restart and purged once
//! past retention.

pub mod clients;
pub mod config;
pub mod error;
pub mod executors;
pub mod lrc;
pub mod models;
pub mod queue;
pub mod repositories;
pub mod routes;

pub use error::{WorkerError, WorkerResult};
pub use queue::{JobQueue, QueueConfig};
pub use repositories::JobStore;
