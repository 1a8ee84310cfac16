//! Structured decision data extracted from a transcript.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Title used when the extractor could not produce one
pub const UNTITLED_DECISION: &str = "Untitled Decision";

/// Confidence reported for the placeholder extraction
pub const FALLBACK_CONFIDENCE: f64 = 0.2;

/// Structured output derived from a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    /// Short title for the decision
    pub title: String,

    /// Options under consideration, in the order they were mentioned
    pub options: Vec<ExtractedOption>,

    /// Emotional state detected in the recording
    pub emotional_state: EmotionalState,

    /// Category guess, if the extractor made one
    pub suggested_category: Option<String>,

    /// Extraction confidence in [0, 1]
    pub confidence: f64,
}

impl Extraction {
    /// Placeholder extraction used when nothing useful could be extracted
    pub fn placeholder() -> Self {
        Self {
            title: UNTITLED_DECISION.to_string(),
            options: vec![ExtractedOption::named("Option 1")],
            emotional_state: EmotionalState::Neutral,
            suggested_category: None,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    /// Category to file the decision under, falling back to `default`
    pub fn category_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.suggested_category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(default)
    }
}

/// A single option with its pros and cons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedOption {
    pub name: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

impl ExtractedOption {
    /// Option with a name and no pros or cons
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pros: Vec::new(),
            cons: Vec::new(),
        }
    }
}

/// Emotional state when making a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    Calm,
    Confident,
    Anxious,
    Excited,
    Uncertain,
    Stressed,
    Neutral,
    Hopeful,
    Frustrated,
}

impl EmotionalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Confident => "confident",
            Self::Anxious => "anxious",
            Self::Excited => "excited",
            Self::Uncertain => "uncertain",
            Self::Stressed => "stressed",
            Self::Neutral => "neutral",
            Self::Hopeful => "hopeful",
            Self::Frustrated => "frustrated",
        }
    }
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self::Neutral
    }
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calm" => Ok(Self::Calm),
            "confident" => Ok(Self::Confident),
            "anxious" => Ok(Self::Anxious),
            "excited" => Ok(Self::Excited),
            "uncertain" => Ok(Self::Uncertain),
            "stressed" => Ok(Self::Stressed),
            "neutral" => Ok(Self::Neutral),
            "hopeful" => Ok(Self::Hopeful),
            "frustrated" => Ok(Self::Frustrated),
            other => Err(format!("Unknown emotional state: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotional_state_parsing() {
        assert_eq!("Anxious".parse::<EmotionalState>(), Ok(EmotionalState::Anxious));
        assert_eq!(" hopeful ".parse::<EmotionalState>(), Ok(EmotionalState::Hopeful));
        assert!("ecstatic".parse::<EmotionalState>().is_err());
    }

    #[test]
    fn test_extraction_camel_case_json() {
        let extraction = Extraction {
            title: "Take the new job?".to_string(),
            options: vec![ExtractedOption {
                name: "Accept".to_string(),
                pros: vec!["Higher salary".to_string()],
                cons: vec!["Longer commute".to_string()],
            }],
            emotional_state: EmotionalState::Excited,
            suggested_category: Some("Career".to_string()),
            confidence: 0.85,
        };

        let json = serde_json::to_value(&extraction).unwrap();
        assert_eq!(json["emotionalState"], "excited");
        assert_eq!(json["suggestedCategory"], "Career");
        assert_eq!(json["options"][0]["pros"][0], "Higher salary");
    }

    #[test]
    fn test_category_fallback() {
        let mut extraction = Extraction::placeholder();
        assert_eq!(extraction.category_or("Personal"), "Personal");

        extraction.suggested_category = Some("  ".to_string());
        assert_eq!(extraction.category_or("Personal"), "Personal");

        extraction.suggested_category = Some("Finance".to_string());
        assert_eq!(extraction.category_or("Personal"), "Finance");
    }
}
