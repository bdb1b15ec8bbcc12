//! Core request and result types.
//!
//! An [`EvaluationRequest`] describes what the child was asked to read and
//! how the audio is encoded; an [`EvaluationResult`] is what one run of the
//! remote engine produced, successful or not.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, FailureKind};
use crate::tree::Utterance;

/// Read-aloud task category understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Isolated characters, one syllable each.
    ReadSyllable,
    /// Multi-syllable words.
    ReadWord,
    /// A single sentence.
    ReadSentence,
    /// A passage.
    ReadChapter,
}

impl Category {
    /// Element name used for this category in the evaluation markup.
    pub fn element_name(&self) -> &'static str {
        match self {
            Category::ReadSyllable => "read_syllable",
            Category::ReadWord => "read_word",
            Category::ReadSentence => "read_sentence",
            Category::ReadChapter => "read_chapter",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read_syllable" | "syllable" => Ok(Category::ReadSyllable),
            "read_word" | "word" => Ok(Category::ReadWord),
            "read_sentence" | "sentence" => Ok(Category::ReadSentence),
            "read_chapter" | "chapter" => Ok(Category::ReadChapter),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Speaker group and language variant the engine should score against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Speaker group (e.g. "pupil", "youth", "adult").
    pub group: String,
    /// Engine language code (e.g. "cn_vip").
    pub language: String,
}

impl Default for LanguageProfile {
    fn default() -> Self {
        Self {
            group: "pupil".to_string(),
            language: "cn_vip".to_string(),
        }
    }
}

/// One evaluation to run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub category: Category,
    /// The text the child was asked to read.
    pub text: String,
    #[serde(default)]
    pub profile: LanguageProfile,
    /// Engine audio encoding name ("raw" for 16-bit PCM).
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_audio_format() -> String {
    "raw".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

impl EvaluationRequest {
    pub fn new(category: Category, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
            profile: LanguageProfile::default(),
            audio_format: default_audio_format(),
            sample_rate: default_sample_rate(),
        }
    }

    /// Request for a row of isolated characters.
    pub fn syllables(text: impl Into<String>) -> Self {
        Self::new(Category::ReadSyllable, text)
    }

    pub fn with_profile(mut self, profile: LanguageProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Reject requests the engine could never score.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.text.trim().is_empty() {
            return Err(EvalError::InvalidRequest("target text is empty".into()));
        }
        if self.sample_rate == 0 {
            return Err(EvalError::InvalidRequest("sample rate must be positive".into()));
        }
        Ok(())
    }
}

/// The five utterance-level scores reported by the engine, 0–100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub total: f64,
    /// Initials and finals.
    pub phone: f64,
    pub tone: f64,
    pub fluency: f64,
    /// Completeness of the reading.
    pub integrity: f64,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub success: bool,
    pub scores: Scores,
    /// Decoded markup exactly as returned by the engine.
    #[serde(default)]
    pub raw_markup: String,
    pub message: String,
    /// Set on every failed result.
    #[serde(default)]
    pub failure: Option<FailureKind>,
    pub timestamp: DateTime<Utc>,
    /// Decoded character tree, present on success.
    #[serde(default)]
    pub utterance: Option<Utterance>,
}

impl EvaluationResult {
    /// A successful result built from decoded markup.
    pub fn completed(raw_markup: String, utterance: Utterance) -> Self {
        Self {
            success: true,
            scores: utterance.scores,
            raw_markup,
            message: "evaluation succeeded".to_string(),
            failure: None,
            timestamp: Utc::now(),
            utterance: Some(utterance),
        }
    }

    /// A failed result carrying the error's kind and message.
    pub fn failed(error: &EvalError) -> Self {
        Self {
            success: false,
            scores: Scores::default(),
            raw_markup: String::new(),
            message: error.to_string(),
            failure: Some(error.kind()),
            timestamp: Utc::now(),
            utterance: None,
        }
    }

    /// Fold an evaluator outcome into a tagged result.
    pub fn from_outcome(outcome: Result<EvaluationResult, EvalError>) -> Self {
        match outcome {
            Ok(result) => result,
            Err(e) => Self::failed(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_and_parse() {
        assert_eq!(Category::ReadSyllable.to_string(), "read_syllable");
        assert_eq!(
            "read_word".parse::<Category>().unwrap(),
            Category::ReadWord
        );
        assert_eq!(
            "Sentence".parse::<Category>().unwrap(),
            Category::ReadSentence
        );
        assert!("read_poem".parse::<Category>().is_err());
    }

    #[test]
    fn request_defaults() {
        let req = EvaluationRequest::syllables("的一了");
        assert_eq!(req.profile.group, "pupil");
        assert_eq!(req.profile.language, "cn_vip");
        assert_eq!(req.audio_format, "raw");
        assert_eq!(req.sample_rate, 16_000);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn blank_text_is_invalid() {
        let err = EvaluationRequest::syllables("  ").validate().unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
    }

    #[test]
    fn failed_result_keeps_message_and_kind() {
        let result = EvaluationResult::failed(&EvalError::TimeoutFailure(std::time::Duration::from_secs(30)));
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert!(result.message.contains("timed out"));
        assert!(result.utterance.is_none());
    }
}
