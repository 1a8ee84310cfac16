//! Voice-to-decision orchestrator.
//!
//! Runs upload → transcribe → extract → persist for one job, advancing its
//! status and progress at each stage, and records the outcome on the job.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AudioStorage, DecisionExtractor, DecisionRepository, Transcriber};
use crate::domain::{
    Extraction, JobPatch, NewDecision, ProcessingJob, ProcessingStatus, DEFAULT_CATEGORY,
};

use super::job_manager::JobManager;

/// Error code recorded on every failed job
pub const PROCESSING_ERROR_CODE: &str = "PROCESSING_ERROR";

/// Progress checkpoints of a successful run
pub mod progress {
    pub const UPLOADED: f64 = 0.1;
    pub const TRANSCRIBING: f64 = 0.3;
    pub const TRANSCRIBED: f64 = 0.6;
    pub const EXTRACTING: f64 = 0.7;
    pub const DONE: f64 = 1.0;
}

/// Failure of a processing run
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Job {0} already {1}")]
    AlreadyFinished(Uuid, ProcessingStatus),

    #[error("Failed to upload audio: {0:#}")]
    Upload(anyhow::Error),

    #[error("Transcription failed: {0:#}")]
    Transcription(anyhow::Error),

    #[error("Extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("Failed to persist decision: {0:#}")]
    Persistence(anyhow::Error),

    #[error("Failed to create decision")]
    DecisionNotCreated,
}

impl ProcessingError {
    /// Code stored on the job. Every stage shares one category.
    pub fn code(&self) -> &'static str {
        PROCESSING_ERROR_CODE
    }
}

/// Result of the job-less analysis path
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceAnalysis {
    pub audio_url: String,
    pub transcript: String,
    pub extraction: Extraction,
    pub duration_seconds: f64,
}

/// Pipelines a recording through the external collaborators
pub struct VoiceProcessor {
    jobs: JobManager,
    storage: Arc<dyn AudioStorage>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn DecisionExtractor>,
    decisions: Arc<dyn DecisionRepository>,
    default_category: String,
}

impl VoiceProcessor {
    /// Create a processor over a job manager and the four collaborators
    pub fn new(
        jobs: JobManager,
        storage: Arc<dyn AudioStorage>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn DecisionExtractor>,
        decisions: Arc<dyn DecisionRepository>,
    ) -> Self {
        Self {
            jobs,
            storage,
            transcriber,
            extractor,
            decisions,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }

    /// Category used when extraction suggests none
    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        self.default_category = category.into();
        self
    }

    /// The job manager this processor writes to
    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Process a recording for an existing job.
    ///
    /// A job that already completed or failed is rejected untouched. On
    /// failure the job is marked failed with the error message and
    /// [`PROCESSING_ERROR_CODE`], and the error is returned.
    #[instrument(skip(self, audio), fields(job_id = %job_id, user_id = %user_id))]
    pub async fn process_recording(
        &self,
        job_id: Uuid,
        user_id: &str,
        audio: &[u8],
        filename: &str,
    ) -> Result<ProcessingJob, ProcessingError> {
        let job = self
            .jobs
            .get_job(job_id)
            .await
            .ok_or(ProcessingError::JobNotFound(job_id))?;
        if job.is_terminal() {
            warn!(status = %job.status, "Job already finished, not reprocessing");
            return Err(ProcessingError::AlreadyFinished(job_id, job.status));
        }

        match self.run_stages(job_id, user_id, audio, filename).await {
            Ok(job) => {
                info!(decision_id = ?job.decision_id, "Job completed");
                Ok(job)
            }
            Err(e) => {
                error!(error = %e, "Job failed");
                self.jobs
                    .mark_failed(job_id, e.to_string(), Some(e.code()))
                    .await;
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        job_id: Uuid,
        user_id: &str,
        audio: &[u8],
        filename: &str,
    ) -> Result<ProcessingJob, ProcessingError> {
        let job = self
            .jobs
            .update_status(job_id, ProcessingStatus::Uploaded, progress::UPLOADED)
            .await
            .ok_or(ProcessingError::JobNotFound(job_id))?;

        // Reuse audio the caller already uploaded
        let audio_url = match job.audio_url {
            Some(url) => {
                debug!(%url, "Audio already uploaded, skipping upload");
                url
            }
            None => {
                let uploaded = self
                    .storage
                    .upload(user_id, audio, filename)
                    .await
                    .map_err(ProcessingError::Upload)?;
                self.jobs
                    .update_job(
                        job_id,
                        JobPatch {
                            audio_url: Some(uploaded.url.clone()),
                            ..Default::default()
                        },
                    )
                    .await;
                uploaded.url
            }
        };

        self.jobs
            .update_status(job_id, ProcessingStatus::Transcribing, progress::TRANSCRIBING)
            .await;
        let transcription = self
            .transcriber
            .transcribe(&audio_url)
            .await
            .map_err(ProcessingError::Transcription)?;
        self.jobs
            .update_job(
                job_id,
                JobPatch {
                    transcript: Some(transcription.transcript.clone()),
                    audio_duration_seconds: Some(transcription.duration_seconds),
                    progress: Some(progress::TRANSCRIBED),
                    ..Default::default()
                },
            )
            .await;
        debug!(
            transcriber = self.transcriber.name(),
            duration_seconds = transcription.duration_seconds,
            "Transcription stored"
        );

        self.jobs
            .update_status(job_id, ProcessingStatus::Extracting, progress::EXTRACTING)
            .await;
        let extraction = self
            .extractor
            .extract(&transcription.transcript)
            .await
            .map_err(ProcessingError::Extraction)?;

        let new_decision = NewDecision::from_extraction(
            &extraction,
            &self.default_category,
            &transcription.transcript,
            Some(&audio_url),
            Some(transcription.duration_seconds),
        );
        let decision = self
            .decisions
            .create_decision(user_id, &new_decision)
            .await
            .map_err(ProcessingError::Persistence)?
            .ok_or(ProcessingError::DecisionNotCreated)?;

        self.jobs
            .mark_completed(job_id, transcription.transcript, extraction, decision.id)
            .await
            .ok_or(ProcessingError::JobNotFound(job_id))
    }

    /// Start processing in the background.
    ///
    /// The caller does not wait for completion. A failed run is recorded on
    /// the job and logged; it is not propagated through the handle.
    pub fn start_background(
        self: &Arc<Self>,
        job_id: Uuid,
        user_id: impl Into<String>,
        audio: Vec<u8>,
        filename: impl Into<String>,
    ) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        let user_id = user_id.into();
        let filename = filename.into();

        tokio::spawn(async move {
            if let Err(e) = processor
                .process_recording(job_id, &user_id, &audio, &filename)
                .await
            {
                error!(%job_id, error = %e, "Background processing failed");
            }
        })
    }

    /// Upload, transcribe and extract without a job record or a persisted
    /// decision
    #[instrument(skip(self, audio), fields(user_id = %user_id))]
    pub async fn analyze_recording(
        &self,
        user_id: &str,
        audio: &[u8],
        filename: &str,
    ) -> Result<VoiceAnalysis, ProcessingError> {
        let uploaded = self
            .storage
            .upload(user_id, audio, filename)
            .await
            .map_err(ProcessingError::Upload)?;
        let transcription = self
            .transcriber
            .transcribe(&uploaded.url)
            .await
            .map_err(ProcessingError::Transcription)?;
        let extraction = self
            .extractor
            .extract(&transcription.transcript)
            .await
            .map_err(ProcessingError::Extraction)?;

        Ok(VoiceAnalysis {
            audio_url: uploaded.url,
            transcript: transcription.transcript,
            extraction,
            duration_seconds: transcription.duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_is_shared() {
        let errors = [
            ProcessingError::Upload(anyhow::anyhow!("bucket missing")),
            ProcessingError::Transcription(anyhow::anyhow!("timeout")),
            ProcessingError::DecisionNotCreated,
        ];

        for e in &errors {
            assert_eq!(e.code(), "PROCESSING_ERROR");
        }
    }

    #[test]
    fn test_error_message_includes_context_chain() {
        let cause = anyhow::anyhow!("connection reset").context("Failed to submit transcription");
        let e = ProcessingError::Transcription(cause);

        let message = e.to_string();
        assert!(message.starts_with("Transcription failed: "));
        assert!(message.contains("Failed to submit transcription"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn test_progress_checkpoints_are_increasing() {
        let checkpoints = [
            progress::UPLOADED,
            progress::TRANSCRIBING,
            progress::TRANSCRIBED,
            progress::EXTRACTING,
            progress::DONE,
        ];
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
    }
}
