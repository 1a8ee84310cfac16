//! AssemblyAI transcription adapter.
//!
//! Submits a transcript request for a public audio URL and polls until the
//! provider reports `completed` or `error`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Transcriber, Transcription};

/// AssemblyAI API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

/// Delay between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
}

/// Transcript resource as returned by submit and poll
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    /// Seconds
    #[serde(default)]
    audio_duration: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl TranscriptResponse {
    /// Convert a finished transcript, or `None` while still running
    fn into_transcription(self) -> Result<Option<Transcription>> {
        match self.status {
            TranscriptStatus::Queued | TranscriptStatus::Processing => Ok(None),
            TranscriptStatus::Error => anyhow::bail!(
                "Transcription failed: {}",
                self.error.unwrap_or_else(|| "unknown error".to_string())
            ),
            TranscriptStatus::Completed => Ok(Some(Transcription {
                transcript: self.text.unwrap_or_default(),
                confidence: self.confidence.unwrap_or(0.0),
                duration_seconds: self.audio_duration.unwrap_or(0.0),
            })),
        }
    }
}

/// AssemblyAI transcriber
pub struct AssemblyAiTranscriber {
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl AssemblyAiTranscriber {
    /// Create a transcriber against the public API
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout)
    }

    /// Create a transcriber against a custom endpoint
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build AssemblyAI HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            client,
        })
    }

    /// Override the delay between status polls
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn transcripts_url(&self) -> String {
        format!("{}/v2/transcript", self.base_url)
    }

    fn transcript_url(&self, id: &str) -> String {
        format!("{}/v2/transcript/{}", self.base_url, id)
    }

    async fn parse(response: reqwest::Response) -> Result<TranscriptResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("AssemblyAI error ({}): {}", status, body.trim());
        }

        response
            .json()
            .await
            .context("Failed to parse AssemblyAI response")
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    fn name(&self) -> &str {
        "assemblyai"
    }

    async fn transcribe(&self, audio_url: &str) -> Result<Transcription> {
        let response = self
            .client
            .post(self.transcripts_url())
            .header("Authorization", &self.api_key)
            .json(&TranscriptRequest { audio_url })
            .send()
            .await
            .context("Failed to submit AssemblyAI transcription")?;
        let mut transcript = Self::parse(response).await?;
        debug!(transcript_id = %transcript.id, "Transcription submitted");

        loop {
            let id = transcript.id.clone();
            if let Some(done) = transcript.into_transcription()? {
                return Ok(done);
            }

            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(self.transcript_url(&id))
                .header("Authorization", &self.api_key)
                .send()
                .await
                .context("Failed to poll AssemblyAI transcription")?;
            transcript = Self::parse(response).await?;
        }
    }
}
