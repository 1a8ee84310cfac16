//! Supabase adapters: audio storage and decision persistence.
//!
//! Storage goes through the Storage REST API, decisions through PostgREST.
//! Both authenticate with the service role key.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AudioStorage, DecisionRepository, UploadedAudio};
use crate::domain::{DecisionRecord, DecisionStatus, EmotionalState, NewDecision};

/// Bucket holding raw recordings
pub const DEFAULT_AUDIO_BUCKET: &str = "audio-recordings";

const DEFAULT_CATEGORY_ICON: &str = "📁";
const DEFAULT_CATEGORY_COLOR: &str = "#00d4aa";

/// Authenticated HTTP access to a Supabase project
#[derive(Clone)]
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url`
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Supabase HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            client,
        })
    }

    /// PostgREST URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Storage API URL for uploading an object
    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// Public URL of an object in a public bucket
    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }
}

/// Fail with the response body if the status is not a success
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{} failed ({}): {}", what, status, body.trim())
}

/// Parse a PostgREST representation (always a JSON array)
async fn read_rows<T: DeserializeOwned>(response: Response, what: &str) -> Result<Vec<T>> {
    let response = ensure_success(response, what).await?;
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", what))
}

/// MIME type for an audio file name
pub fn audio_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "m4a" | "mp4" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "audio/webm",
    }
}

/// URL-safe slug for a category name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

// ============================================================================
// Storage
// ============================================================================

/// Recording storage in a Supabase bucket
pub struct SupabaseStorage {
    client: SupabaseClient,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: SupabaseClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Object path for a new upload: `{user}/{epoch millis}-{filename}`
    fn object_path(user_id: &str, filename: &str) -> String {
        format!("{}/{}-{}", user_id, Utc::now().timestamp_millis(), filename)
    }
}

#[async_trait]
impl AudioStorage for SupabaseStorage {
    fn name(&self) -> &str {
        "supabase-storage"
    }

    async fn upload(&self, user_id: &str, audio: &[u8], filename: &str) -> Result<UploadedAudio> {
        let path = Self::object_path(user_id, filename);
        debug!(%path, bytes = audio.len(), "Uploading audio");

        let request = self
            .client
            .client
            .post(self.client.object_url(&self.bucket, &path))
            .header("Content-Type", audio_content_type(filename))
            .header("x-upsert", "false")
            .body(audio.to_vec());

        let response = self
            .client
            .authed(request)
            .send()
            .await
            .context("Failed to upload audio")?;
        ensure_success(response, "Audio upload").await?;

        Ok(UploadedAudio {
            url: self.client.public_url(&self.bucket, &path),
            path,
        })
    }
}

// ============================================================================
// Decisions
// ============================================================================

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

#[derive(Debug, Serialize)]
struct CategoryInsert<'a> {
    user_id: &'a str,
    name: &'a str,
    slug: String,
    icon: &'a str,
    color: &'a str,
}

#[derive(Debug, Serialize)]
struct DecisionInsert<'a> {
    user_id: &'a str,
    title: &'a str,
    status: DecisionStatus,
    category_id: &'a str,
    detected_emotional_state: EmotionalState,
    raw_transcript: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_duration_seconds: Option<f64>,
    ai_confidence: f64,
}

#[derive(Debug, Serialize)]
struct OptionInsert<'a> {
    decision_id: &'a str,
    title: &'a str,
    display_order: usize,
}

#[derive(Debug, Serialize)]
struct ProConInsert<'a> {
    option_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
    display_order: usize,
}

/// Decision persistence in the Supabase `decisions`, `options` and
/// `pros_cons` tables
pub struct SupabaseDecisions {
    client: SupabaseClient,
}

impl SupabaseDecisions {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Find the user's category by name, creating it if it does not exist
    async fn resolve_category(&self, user_id: &str, name: &str) -> Result<String> {
        let request = self
            .client
            .client
            .get(self.client.rest_url("categories"))
            .query(&[
                ("select", "id".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("name", format!("eq.{}", name)),
                ("limit", "1".to_string()),
            ]);
        let response = self
            .client
            .authed(request)
            .send()
            .await
            .context("Failed to look up category")?;

        let existing: Vec<IdRow> = read_rows(response, "Category lookup").await?;
        if let Some(row) = existing.into_iter().next() {
            return Ok(row.id);
        }

        debug!(category = %name, "Creating category");
        let insert = CategoryInsert {
            user_id,
            name,
            slug: slugify(name),
            icon: DEFAULT_CATEGORY_ICON,
            color: DEFAULT_CATEGORY_COLOR,
        };
        let created: Vec<IdRow> = self.insert_returning("categories", &insert).await?;

        created
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| anyhow::anyhow!("Category insert returned no rows"))
    }

    /// Insert rows and return their representation
    async fn insert_returning<B, T>(&self, table: &str, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .client
            .post(self.client.rest_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        let response = self
            .client
            .authed(request)
            .send()
            .await
            .with_context(|| format!("Failed to insert into {}", table))?;

        read_rows(response, &format!("Insert into {}", table)).await
    }

    /// Insert rows without reading them back
    async fn insert_minimal<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> Result<()> {
        let request = self
            .client
            .client
            .post(self.client.rest_url(table))
            .header("Prefer", "return=minimal")
            .json(body);
        let response = self
            .client
            .authed(request)
            .send()
            .await
            .with_context(|| format!("Failed to insert into {}", table))?;

        ensure_success(response, &format!("Insert into {}", table)).await?;
        Ok(())
    }
}

#[async_trait]
impl DecisionRepository for SupabaseDecisions {
    fn name(&self) -> &str {
        "supabase-decisions"
    }

    async fn create_decision(
        &self,
        user_id: &str,
        decision: &NewDecision,
    ) -> Result<Option<DecisionRecord>> {
        let category_id = self.resolve_category(user_id, &decision.category).await?;

        let insert = DecisionInsert {
            user_id,
            title: &decision.title,
            status: decision.status,
            category_id: &category_id,
            detected_emotional_state: decision.emotional_state,
            raw_transcript: &decision.transcription,
            audio_url: decision.audio_url.as_deref(),
            audio_duration_seconds: decision.audio_duration_seconds,
            ai_confidence: decision.ai_confidence,
        };
        let rows: Vec<DecisionRecord> = self.insert_returning("decisions", &insert).await?;
        let Some(record) = rows.into_iter().next() else {
            return Ok(None);
        };

        for (position, option) in decision.options.iter().enumerate() {
            let option_rows: Vec<IdRow> = self
                .insert_returning(
                    "options",
                    &OptionInsert {
                        decision_id: &record.id,
                        title: &option.name,
                        display_order: position,
                    },
                )
                .await?;
            let option_id = option_rows
                .into_iter()
                .next()
                .map(|row| row.id)
                .ok_or_else(|| anyhow::anyhow!("Option insert returned no rows"))?;

            let pros = option.pros.iter().enumerate().map(|(i, content)| ProConInsert {
                option_id: &option_id,
                kind: "pro",
                content,
                display_order: i,
            });
            let cons = option.cons.iter().enumerate().map(|(i, content)| ProConInsert {
                option_id: &option_id,
                kind: "con",
                content,
                display_order: i,
            });
            let rows: Vec<ProConInsert<'_>> = pros.chain(cons).collect();

            if !rows.is_empty() {
                self.insert_minimal("pros_cons", &rows).await?;
            }
        }

        debug!(decision_id = %record.id, options = decision.options.len(), "Decision persisted");
        Ok(Some(record))
    }
}
