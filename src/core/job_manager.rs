//! Job status manager: the mutation surface for processing jobs.
//!
//! Derives `started_at` and `completed_at` from status transitions and owns
//! the terminal-job cleanup policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Extraction, JobPatch, ProcessingJob, ProcessingStatus};

use super::job_store::{InMemoryJobStore, JobStore};

/// Default age after which finished jobs are swept (24 hours)
pub const DEFAULT_MAX_JOB_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Create/read/update operations over a [`JobStore`]
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn JobStore>,
}

impl JobManager {
    /// Create a manager over an existing store
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Create a manager backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryJobStore::new()))
    }

    /// Create a new job in the `uploaded` state with zero progress
    pub async fn create_job(
        &self,
        user_id: impl Into<String>,
        audio_url: Option<String>,
        audio_duration_seconds: Option<f64>,
    ) -> ProcessingJob {
        let job = ProcessingJob::new(user_id.into(), audio_url, audio_duration_seconds);
        debug!(job_id = %job.id, user_id = %job.user_id, "Created processing job");
        self.store.insert(job.clone()).await;
        job
    }

    /// Look up a job by id
    pub async fn get_job(&self, job_id: Uuid) -> Option<ProcessingJob> {
        self.store.get(job_id).await
    }

    /// Merge fields into a job. Returns `None` if the job does not exist.
    pub async fn update_job(&self, job_id: Uuid, patch: JobPatch) -> Option<ProcessingJob> {
        self.store.update(job_id, patch).await
    }

    /// Set status and progress
    pub async fn update_status(
        &self,
        job_id: Uuid,
        status: ProcessingStatus,
        progress: f64,
    ) -> Option<ProcessingJob> {
        self.update_status_with(job_id, status, progress, JobPatch::default())
            .await
    }

    /// Set status and progress along with extra fields.
    ///
    /// The first transition into `transcribing` stamps `started_at`; any
    /// transition into a terminal state stamps `completed_at`.
    pub async fn update_status_with(
        &self,
        job_id: Uuid,
        status: ProcessingStatus,
        progress: f64,
        extra: JobPatch,
    ) -> Option<ProcessingJob> {
        let now = Utc::now();
        let mut patch = JobPatch {
            status: Some(status),
            progress: Some(progress),
            ..extra
        };

        if status == ProcessingStatus::Transcribing {
            // write-once in the store, so repeated calls keep the first stamp
            patch.started_at = Some(now);
        }
        if status.is_terminal() {
            patch.completed_at = Some(now);
        }

        self.store.update(job_id, patch).await
    }

    /// Mark a job as failed with a message and optional code
    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        error_message: impl Into<String>,
        error_code: Option<&str>,
    ) -> Option<ProcessingJob> {
        let extra = JobPatch {
            error_message: Some(error_message.into()),
            error_code: error_code.map(str::to_string),
            ..Default::default()
        };
        self.update_status_with(job_id, ProcessingStatus::Failed, 1.0, extra)
            .await
    }

    /// Mark a job as completed with its results
    pub async fn mark_completed(
        &self,
        job_id: Uuid,
        transcript: impl Into<String>,
        extraction: Extraction,
        decision_id: impl Into<String>,
    ) -> Option<ProcessingJob> {
        let extra = JobPatch {
            transcript: Some(transcript.into()),
            extraction: Some(extraction),
            decision_id: Some(decision_id.into()),
            ..Default::default()
        };
        self.update_status_with(job_id, ProcessingStatus::Completed, 1.0, extra)
            .await
    }

    /// Remove terminal jobs older than `max_age`. Returns the number removed.
    pub async fn cleanup_old_jobs(&self, max_age: Duration) -> usize {
        self.cleanup_old_jobs_at(max_age, Utc::now()).await
    }

    /// Remove terminal jobs whose age at `now` exceeds `max_age`.
    /// Jobs still in flight are kept regardless of age.
    pub async fn cleanup_old_jobs_at(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let max_age = chrono::TimeDelta::from_std(max_age).unwrap_or(chrono::TimeDelta::MAX);
        let predicate = move |job: &ProcessingJob| job.is_terminal() && job.age_at(now) > max_age;
        self.store.remove_where(&predicate).await
    }

    /// Number of jobs currently held
    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::in_memory()
    }
}
