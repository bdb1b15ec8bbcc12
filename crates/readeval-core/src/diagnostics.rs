//! Correctness and error descriptions derived from a decoded tree.
//!
//! Rules, bottom-up:
//! - a content phone is correct when it has no insertion/deletion error and
//!   no pronunciation error;
//! - a content syllable is correct when its own error code is clear and all
//!   its content phones are correct;
//! - a character is read when it has a content syllable, and correct when it
//!   is read and every content syllable is correct.
//!
//! Silence and noise nodes are never penalized.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::{
    CharacterNode, ErrorCode, Mispronunciation, NodeClass, PhoneKind, PhoneNode, SyllableNode,
    Utterance,
};

/// Human-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDescription {
    Missed,
    Added,
    Repeated,
    Replaced,
    ConsonantInaccurate,
    VowelInaccurate,
    ToneInaccurate,
    VowelAndToneInaccurate,
    Unclassified(u32),
}

impl ErrorDescription {
    fn from_error_code(code: ErrorCode) -> Option<Self> {
        match code {
            ErrorCode::Correct => None,
            ErrorCode::Missed => Some(ErrorDescription::Missed),
            ErrorCode::Added => Some(ErrorDescription::Added),
            ErrorCode::Repeated => Some(ErrorDescription::Repeated),
            ErrorCode::Replaced => Some(ErrorDescription::Replaced),
        }
    }

    fn from_mispronunciation(m: Mispronunciation) -> Option<Self> {
        match m {
            Mispronunciation::None => None,
            Mispronunciation::ConsonantInaccurate => Some(ErrorDescription::ConsonantInaccurate),
            Mispronunciation::VowelInaccurate => Some(ErrorDescription::VowelInaccurate),
            Mispronunciation::ToneInaccurate => Some(ErrorDescription::ToneInaccurate),
            Mispronunciation::VowelAndToneInaccurate => {
                Some(ErrorDescription::VowelAndToneInaccurate)
            }
            Mispronunciation::Unclassified(code) => Some(ErrorDescription::Unclassified(code)),
        }
    }
}

impl fmt::Display for ErrorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDescription::Missed => f.write_str("missed"),
            ErrorDescription::Added => f.write_str("added"),
            ErrorDescription::Repeated => f.write_str("repeated"),
            ErrorDescription::Replaced => f.write_str("replaced"),
            ErrorDescription::ConsonantInaccurate => f.write_str("consonant inaccurate"),
            ErrorDescription::VowelInaccurate => f.write_str("vowel inaccurate"),
            ErrorDescription::ToneInaccurate => f.write_str("tone inaccurate"),
            ErrorDescription::VowelAndToneInaccurate => f.write_str("vowel+tone inaccurate"),
            ErrorDescription::Unclassified(code) => write!(f, "unclassified error {code}"),
        }
    }
}

impl PhoneNode {
    pub fn is_correct(&self) -> bool {
        match self.kind {
            PhoneKind::Content(phone) => {
                phone.error == ErrorCode::Correct && phone.mispronunciation.is_none()
            }
            PhoneKind::Silence | PhoneKind::Noise => true,
        }
    }

    /// Why this phone is wrong. The insertion/deletion code takes precedence
    /// over the pronunciation error.
    pub fn error_description(&self) -> Option<ErrorDescription> {
        match self.kind {
            PhoneKind::Content(phone) => ErrorDescription::from_error_code(phone.error)
                .or_else(|| ErrorDescription::from_mispronunciation(phone.mispronunciation)),
            PhoneKind::Silence | PhoneKind::Noise => None,
        }
    }
}

impl SyllableNode {
    pub fn is_correct(&self) -> bool {
        if !self.is_content() {
            return true;
        }
        self.error == ErrorCode::Correct && self.phones.iter().all(PhoneNode::is_correct)
    }

    pub fn error_description(&self) -> Option<ErrorDescription> {
        if !self.is_content() {
            return None;
        }
        ErrorDescription::from_error_code(self.error)
    }

    /// Errors of this syllable and of each wrong phone, e.g.
    /// `"syllable missed; b(missed)"`.
    pub fn error_summary(&self) -> String {
        if self.is_correct() {
            return "correct".to_string();
        }

        let mut parts = Vec::new();
        if let Some(desc) = self.error_description() {
            parts.push(format!("syllable {desc}"));
        }
        for phone in &self.phones {
            if let Some(desc) = phone.error_description() {
                parts.push(format!("{}({desc})", phone.content));
            }
        }

        if parts.is_empty() {
            "unknown error".to_string()
        } else {
            parts.join("; ")
        }
    }
}

impl CharacterNode {
    pub fn is_read(&self) -> bool {
        self.content_syllables().next().is_some()
    }

    pub fn is_correct(&self) -> bool {
        self.is_read() && self.content_syllables().all(SyllableNode::is_correct)
    }

    pub fn speech_duration_ms(&self) -> u64 {
        self.content_syllables().map(|s| s.span.duration_ms()).sum()
    }

    pub fn silence_duration_ms(&self) -> u64 {
        self.silence_syllables().map(|s| s.span.duration_ms()).sum()
    }

    /// One-line verdict: `"missed"`, `"correct"`, or the first wrong
    /// syllable's error summary.
    pub fn status_summary(&self) -> String {
        if !self.is_read() {
            return ErrorDescription::Missed.to_string();
        }
        self.content_syllables()
            .find(|s| !s.is_correct())
            .map(SyllableNode::error_summary)
            .unwrap_or_else(|| "correct".to_string())
    }
}

impl Utterance {
    /// Glyphs of every correctly read character.
    pub fn correct_glyphs(&self) -> HashSet<&str> {
        self.characters
            .iter()
            .filter(|c| c.is_correct())
            .map(|c| c.glyph.as_str())
            .collect()
    }

    pub fn speech_duration_ms(&self) -> u64 {
        self.characters.iter().map(|c| c.speech_duration_ms()).sum()
    }

    pub fn silence_duration_ms(&self) -> u64 {
        self.characters.iter().map(|c| c.silence_duration_ms()).sum()
    }
}

/// Flattened per-character verdict, serialized into audit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDiagnostic {
    pub character: String,
    pub expected_reading: String,
    pub actual_reading: String,
    pub is_read: bool,
    pub is_correct: bool,
    pub status: String,
    pub begin_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub speech_ms: u64,
    pub silence_ms: u64,
    pub syllables: Vec<SyllableDiagnostic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllableDiagnostic {
    pub content: String,
    pub symbol: String,
    pub class: NodeClass,
    pub duration_ms: u64,
    /// `None` for silence and noise.
    pub is_correct: Option<bool>,
    pub error_summary: Option<String>,
}

impl From<&CharacterNode> for CharacterDiagnostic {
    fn from(c: &CharacterNode) -> Self {
        Self {
            character: c.glyph.clone(),
            expected_reading: c.expected_reading.clone(),
            actual_reading: c.actual_reading().to_string(),
            is_read: c.is_read(),
            is_correct: c.is_correct(),
            status: c.status_summary(),
            begin_ms: c.span.begin_ms(),
            end_ms: c.span.end_ms(),
            duration_ms: c.duration_ms(),
            speech_ms: c.speech_duration_ms(),
            silence_ms: c.silence_duration_ms(),
            syllables: c.syllables.iter().map(SyllableDiagnostic::from).collect(),
        }
    }
}

impl From<&SyllableNode> for SyllableDiagnostic {
    fn from(s: &SyllableNode) -> Self {
        let content = s.is_content();
        Self {
            content: s.content.clone(),
            symbol: s.symbol.clone(),
            class: s.class,
            duration_ms: s.span.duration_ms(),
            is_correct: content.then(|| s.is_correct()),
            error_summary: (content && !s.is_correct()).then(|| s.error_summary()),
        }
    }
}

/// Diagnostics for every character, in markup order.
pub fn character_diagnostics(utterance: &Utterance) -> Vec<CharacterDiagnostic> {
    utterance
        .characters
        .iter()
        .map(CharacterDiagnostic::from)
        .collect()
}
