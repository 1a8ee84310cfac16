//! Processing job state for the voice-to-decision pipeline.
//!
//! A job tracks one recording from upload through transcription and
//! extraction until a decision is persisted or the run fails.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extraction::Extraction;

/// One in-flight voice-to-decision conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    /// Unique identifier for this job
    pub id: Uuid,

    /// Owner of the recording
    pub user_id: String,

    /// Current pipeline state
    pub status: ProcessingStatus,

    /// Fraction of work done, in [0, 1]
    pub progress: f64,

    /// Uploaded audio location (write-once)
    pub audio_url: Option<String>,

    /// Recording length, known once transcription completes
    pub audio_duration_seconds: Option<f64>,

    /// Transcript text, known once transcription completes
    pub transcript: Option<String>,

    /// Structured extraction, known once extraction completes
    pub extraction: Option<Extraction>,

    /// Persisted decision (success only)
    pub decision_id: Option<String>,

    /// Failure message (failure only)
    pub error_message: Option<String>,

    /// Failure code (failure only)
    pub error_code: Option<String>,

    /// Reserved; nothing retries a job yet
    pub retry_count: u32,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// First transition into `transcribing`
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    /// Create a job in the initial `uploaded` state with zero progress
    pub fn new(
        user_id: String,
        audio_url: Option<String>,
        audio_duration_seconds: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: ProcessingStatus::Uploaded,
            progress: 0.0,
            audio_url,
            audio_duration_seconds,
            transcript: None,
            extraction: None,
            decision_id: None,
            error_message: None,
            error_code: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Merge a patch into this job.
    ///
    /// `audio_url` and `started_at` are write-once: a patch only fills them
    /// while they are still unset. Progress is clamped to [0, 1].
    ///
    /// A job in a terminal state is frozen; the patch is ignored and `false`
    /// is returned.
    pub fn apply(&mut self, patch: JobPatch) -> bool {
        if self.is_terminal() {
            return false;
        }

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.clamp(0.0, 1.0);
        }
        if let Some(audio_url) = patch.audio_url {
            self.audio_url.get_or_insert(audio_url);
        }
        if let Some(duration) = patch.audio_duration_seconds {
            self.audio_duration_seconds = Some(duration);
        }
        if let Some(transcript) = patch.transcript {
            self.transcript = Some(transcript);
        }
        if let Some(extraction) = patch.extraction {
            self.extraction = Some(extraction);
        }
        if let Some(decision_id) = patch.decision_id {
            self.decision_id = Some(decision_id);
        }
        if let Some(error_message) = patch.error_message {
            self.error_message = Some(error_message);
        }
        if let Some(error_code) = patch.error_code {
            self.error_code = Some(error_code);
        }
        if let Some(started_at) = patch.started_at {
            self.started_at.get_or_insert(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
        true
    }

    /// Check if the job has reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Age of the job relative to `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// The subset of fields exposed to a status poller
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            decision_id: self.decision_id.clone(),
            error_message: self.error_message.clone(),
            error_code: self.error_code.clone(),
        }
    }
}

/// Pipeline state of a processing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Audio received (initial state)
    Uploaded,

    /// Audio is being converted to text
    Transcribing,

    /// Decision data is being extracted from the transcript
    Extracting,

    /// Decision persisted
    Completed,

    /// Pipeline stopped with an error
    Failed,
}

impl ProcessingStatus {
    /// `completed` and `failed` are terminal; no transitions leave them
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Transcribing => "transcribing",
            Self::Extracting => "extracting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self::Uploaded
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial update of a processing job. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<ProcessingStatus>,
    pub progress: Option<f64>,
    pub audio_url: Option<String>,
    pub audio_duration_seconds: Option<f64>,
    pub transcript: Option<String>,
    pub extraction: Option<Extraction>,
    pub decision_id: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Status-polling response shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: ProcessingStatus,
    pub progress: f64,
    pub decision_id: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = ProcessingJob::new("user1".to_string(), None, None);

        assert_eq!(job.status, ProcessingStatus::Uploaded);
        assert_eq!(job.progress, 0.0);
        assert!(job.audio_url.is_none());
        assert!(job.transcript.is_none());
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn test_apply_write_once_fields() {
        let mut job = ProcessingJob::new("user1".to_string(), Some("a.webm".to_string()), None);
        let first = Utc::now();

        job.apply(JobPatch {
            audio_url: Some("b.webm".to_string()),
            started_at: Some(first),
            ..Default::default()
        });
        job.apply(JobPatch {
            started_at: Some(first + chrono::Duration::seconds(5)),
            ..Default::default()
        });

        assert_eq!(job.audio_url.as_deref(), Some("a.webm"));
        assert_eq!(job.started_at, Some(first));
    }

    #[test]
    fn test_apply_clamps_progress() {
        let mut job = ProcessingJob::new("user1".to_string(), None, None);

        job.apply(JobPatch {
            progress: Some(1.7),
            ..Default::default()
        });
        assert_eq!(job.progress, 1.0);

        job.apply(JobPatch {
            progress: Some(-0.2),
            ..Default::default()
        });
        assert_eq!(job.progress, 0.0);
    }

    #[test]
    fn test_terminal_job_ignores_patches() {
        let mut job = ProcessingJob::new("user1".to_string(), None, None);
        let done_at = Utc::now();

        assert!(job.apply(JobPatch {
            status: Some(ProcessingStatus::Completed),
            progress: Some(1.0),
            decision_id: Some("decision-1".to_string()),
            completed_at: Some(done_at),
            ..Default::default()
        }));

        let applied = job.apply(JobPatch {
            status: Some(ProcessingStatus::Transcribing),
            progress: Some(0.3),
            error_message: Some("late failure".to_string()),
            ..Default::default()
        });

        assert!(!applied);
        assert_eq!(job.status, ProcessingStatus::Completed);
        assert_eq!(job.progress, 1.0);
        assert_eq!(job.completed_at, Some(done_at));
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ProcessingStatus::Transcribing).unwrap();
        assert_eq!(json, "\"transcribing\"");
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::Extracting.is_terminal());
    }

    #[test]
    fn test_status_view_is_camel_case() {
        let job = ProcessingJob::new("user1".to_string(), None, None);
        let json = serde_json::to_value(job.status_view()).unwrap();

        assert_eq!(json["status"], "uploaded");
        assert!(json.get("jobId").is_some());
        assert!(json["decisionId"].is_null());
    }
}
