//! In-memory job index
//!
//! A concurrent `id -> Job` map in front of the store. It is a cache only:
//! entries may be evicted at any time and readers fall back to the store.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::Job;

#[derive(Debug, Default)]
pub struct JobIndex {
    jobs: DashMap<Uuid, Job>,
}

impl JobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `job.id`
    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.remove(&id).map(|(_, job)| job)
    }

    /// Drop terminal jobs last updated before `cutoff`; returns how many went
    pub fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        self.jobs.retain(|_, job| {
            let keep = !(job.is_terminal() && job.updated_at < cutoff);
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
