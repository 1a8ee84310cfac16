//! Keyed storage for processing jobs.
//!
//! The store is a pure data holder: every operation is total and a lookup
//! miss is `None`. Records are merged under a single write lock so
//! concurrent tasks updating the same job never lose writes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{JobPatch, ProcessingJob};

/// Storage backend for processing jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a job, replacing any record with the same id
    async fn insert(&self, job: ProcessingJob);

    /// Look up a job by id
    async fn get(&self, id: Uuid) -> Option<ProcessingJob>;

    /// Merge `patch` into the stored job and return the updated record.
    /// Returns `None` (and stores nothing) if the job does not exist. A job
    /// that is already completed or failed is returned unchanged.
    async fn update(&self, id: Uuid, patch: JobPatch) -> Option<ProcessingJob>;

    /// Remove every job matching `predicate`, returning how many were removed
    async fn remove_where(
        &self,
        predicate: &(dyn for<'j> Fn(&'j ProcessingJob) -> bool + Send + Sync),
    ) -> usize;

    /// Number of stored jobs
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-process job store. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, ProcessingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: ProcessingJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get(&self, id: Uuid) -> Option<ProcessingJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn update(&self, id: Uuid, patch: JobPatch) -> Option<ProcessingJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        job.apply(patch);
        Some(job.clone())
    }

    async fn remove_where(
        &self,
        predicate: &(dyn for<'j> Fn(&'j ProcessingJob) -> bool + Send + Sync),
    ) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !predicate(job));
        before - jobs.len()
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}
