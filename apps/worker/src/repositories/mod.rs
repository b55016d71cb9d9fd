//! Persistence layer

mod job;

pub use job::{JobStore, StoreError, StoreResult};
