//! OpenAI decision extraction adapter.
//!
//! Uses chat completions in JSON mode and normalizes whatever comes back
//! into a well-formed [`Extraction`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::DecisionExtractor;
use crate::domain::{EmotionalState, ExtractedOption, Extraction};

/// OpenAI API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Confidence assumed when the model omits one
const DEFAULT_CONFIDENCE: f64 = 0.5;

const TEMPERATURE: f64 = 0.3;

const SYSTEM_PROMPT: &str = r#"You are an AI assistant that extracts structured decision data from voice transcripts.
Extract the following information:
- title: A clear, concise title for the decision (max 100 chars)
- options: Array of options being considered (each with name, pros array, cons array)
- emotionalState: One of: calm, confident, anxious, excited, uncertain, stressed, neutral, hopeful, frustrated
- suggestedCategory: Business, Health, Relationships, Career, Finance, Education, Lifestyle, or null

Return ONLY valid JSON matching this structure:
{
  "title": "string",
  "options": [{"name": "string", "pros": ["string"], "cons": ["string"]}],
  "emotionalState": "calm|confident|anxious|excited|uncertain|stressed|neutral|hopeful|frustrated",
  "suggestedCategory": "Business|Health|Relationships|Career|Finance|Education|Lifestyle|null",
  "confidence": 0.0-1.0
}

If the transcript is unclear or incomplete, still extract what you can but set a lower confidence score.
Confidence scoring:
- 0.9-1.0: Very clear transcript with all required information
- 0.7-0.9: Clear transcript with most information
- 0.5-0.7: Unclear or incomplete transcript, some information missing
- 0.3-0.5: Very unclear or minimal information
- 0.0-0.3: Almost no useful information"#;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-backed decision extractor
pub struct OpenAiExtractor {
    api_key: String,
    base_url: String,
    model: String,
    fallback_on_error: bool,
    client: reqwest::Client,
}

impl OpenAiExtractor {
    /// Create an extractor using the default model and endpoint
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fallback_on_error: false,
            client,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Return the low-confidence placeholder instead of failing
    pub fn with_fallback_on_error(mut self, fallback_on_error: bool) -> Self {
        self.fallback_on_error = fallback_on_error;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, transcript: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Extract decision data from this transcript:\n\n{}", transcript),
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }

    async fn request_extraction(&self, transcript: &str) -> Result<Extraction> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&self.request(transcript))
            .send()
            .await
            .context("Failed to call OpenAI")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI error ({}): {}", status, body.trim());
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))?;

        let raw: Value =
            serde_json::from_str(&content).context("OpenAI returned invalid JSON")?;
        Ok(normalize_extraction(&raw))
    }
}

#[async_trait]
impl DecisionExtractor for OpenAiExtractor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(&self, transcript: &str) -> Result<Extraction> {
        match self.request_extraction(transcript).await {
            Ok(extraction) => Ok(extraction),
            Err(e) if self.fallback_on_error => {
                warn!(error = %e, "Extraction failed, returning placeholder");
                Ok(Extraction::placeholder())
            }
            Err(e) => Err(e),
        }
    }
}

/// Normalize raw model output into a complete extraction.
///
/// Missing or malformed fields fall back to the placeholder values; the
/// confidence is clamped to [0, 1].
pub fn normalize_extraction(raw: &Value) -> Extraction {
    let placeholder = Extraction::placeholder();

    let title = raw
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or(placeholder.title);

    let options: Vec<ExtractedOption> = raw
        .get("options")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_option).collect())
        .unwrap_or_default();
    let options = if options.is_empty() {
        placeholder.options
    } else {
        options
    };

    let emotional_state = raw
        .get("emotionalState")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<EmotionalState>().ok())
        .unwrap_or_default();

    let suggested_category = raw
        .get("suggestedCategory")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("null"))
        .map(str::to_string);

    let confidence = raw
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    Extraction {
        title,
        options,
        emotional_state,
        suggested_category,
        confidence,
    }
}

fn normalize_option(raw: &Value) -> Option<ExtractedOption> {
    let name = ["name", "text", "title"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|n| !n.is_empty())?;

    Some(ExtractedOption {
        name: name.to_string(),
        pros: string_list(raw.get("pros")),
        cons: string_list(raw.get("cons")),
    })
}

fn string_list(raw: Option<&Value>) -> Vec<String> {
    raw.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
