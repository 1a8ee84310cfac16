//! Collaborator interfaces for the voice pipeline.
//!
//! The orchestrator treats storage, transcription, extraction and decision
//! persistence as black boxes behind these traits. HTTP implementations
//! live in the submodules.

pub mod assemblyai;
pub mod openai;
pub mod supabase;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{DecisionRecord, Extraction, NewDecision};

// Re-export the concrete adapters
pub use assemblyai::AssemblyAiTranscriber;
pub use openai::OpenAiExtractor;
pub use supabase::{SupabaseClient, SupabaseDecisions, SupabaseStorage};

/// Location of an uploaded recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAudio {
    /// Publicly readable URL
    pub url: String,

    /// Object path inside the bucket
    pub path: String,
}

/// Output of a transcription
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    /// Transcript text (may be empty)
    pub transcript: String,

    /// Provider confidence in [0, 1]
    pub confidence: f64,

    /// Recording length in seconds
    pub duration_seconds: f64,
}

/// Blob storage for raw recordings
#[async_trait]
pub trait AudioStorage: Send + Sync {
    fn name(&self) -> &str;

    /// Upload a recording for a user
    async fn upload(&self, user_id: &str, audio: &[u8], filename: &str) -> Result<UploadedAudio>;
}

/// Speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe the recording at `audio_url`
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription>;
}

/// Structured decision extraction from free text
#[async_trait]
pub trait DecisionExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Extract title, options, emotional state, category and confidence
    async fn extract(&self, transcript: &str) -> Result<Extraction>;
}

/// Decision persistence
#[async_trait]
pub trait DecisionRepository: Send + Sync {
    fn name(&self) -> &str;

    /// Persist a new decision. `Ok(None)` means the backend created nothing.
    async fn create_decision(
        &self,
        user_id: &str,
        decision: &NewDecision,
    ) -> Result<Option<DecisionRecord>>;
}
