//! Decision records handed to the persistence collaborator.

use serde::{Deserialize, Serialize};

use super::extraction::{EmotionalState, ExtractedOption, Extraction};

/// Category used when extraction suggests none
pub const DEFAULT_CATEGORY: &str = "Personal";

/// Decision status throughout its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Draft,
    Deliberating,
    Decided,
    Abandoned,
    Reviewed,
}

impl Default for DecisionStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Fields for a decision created from a voice recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDecision {
    pub title: String,
    pub status: DecisionStatus,
    pub category: String,
    pub emotional_state: EmotionalState,
    pub options: Vec<ExtractedOption>,
    pub transcription: String,
    pub audio_url: Option<String>,
    pub audio_duration_seconds: Option<f64>,
    pub ai_confidence: f64,
}

impl NewDecision {
    /// Build a draft decision from an extraction and the recording metadata
    pub fn from_extraction(
        extraction: &Extraction,
        default_category: &str,
        transcription: &str,
        audio_url: Option<&str>,
        audio_duration_seconds: Option<f64>,
    ) -> Self {
        Self {
            title: extraction.title.clone(),
            status: DecisionStatus::Draft,
            category: extraction.category_or(default_category).to_string(),
            emotional_state: extraction.emotional_state,
            options: extraction.options.clone(),
            transcription: transcription.to_string(),
            audio_url: audio_url.map(str::to_string),
            audio_duration_seconds,
            ai_confidence: extraction.confidence,
        }
    }
}

/// A persisted decision as returned by the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extraction_uses_default_category() {
        let extraction = Extraction::placeholder();
        let decision = NewDecision::from_extraction(
            &extraction,
            DEFAULT_CATEGORY,
            "should I move?",
            Some("https://cdn.test/a.webm"),
            Some(12.5),
        );

        assert_eq!(decision.category, "Personal");
        assert_eq!(decision.status, DecisionStatus::Draft);
        assert_eq!(decision.ai_confidence, extraction.confidence);
        assert_eq!(decision.audio_duration_seconds, Some(12.5));
    }

    #[test]
    fn test_from_extraction_keeps_suggested_category() {
        let mut extraction = Extraction::placeholder();
        extraction.suggested_category = Some("Health".to_string());

        let decision =
            NewDecision::from_extraction(&extraction, DEFAULT_CATEGORY, "", None, None);
        assert_eq!(decision.category, "Health");
        assert!(decision.audio_url.is_none());
    }
}
