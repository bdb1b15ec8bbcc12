//! Decoded evaluation tree: utterance → character → syllable → phone.
//!
//! The tree is built once by [`MarkupDecoder`](crate::markup::MarkupDecoder)
//! and never mutated afterwards. Correctness and error descriptions are
//! derived from it in [`diagnostics`](crate::diagnostics).

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::model::Scores;

/// Length of one engine time unit in milliseconds.
pub const TIME_UNIT_MS: u64 = 10;

/// Position and length of a node, in engine time units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub begin: u32,
    pub end: u32,
    pub length: u32,
}

impl Span {
    pub fn begin_ms(&self) -> u64 {
        self.begin as u64 * TIME_UNIT_MS
    }

    pub fn end_ms(&self) -> u64 {
        self.end as u64 * TIME_UNIT_MS
    }

    pub fn duration_ms(&self) -> u64 {
        self.length as u64 * TIME_UNIT_MS
    }
}

/// What a decoded node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Speech belonging to the target text.
    Content,
    Silence,
    /// Background noise or anything else that is not target speech.
    Noise,
}

impl NodeClass {
    /// Map the engine's `rec_node_type` attribute.
    pub fn from_markup(value: &str) -> Self {
        match value {
            "paper" => NodeClass::Content,
            "sil" => NodeClass::Silence,
            _ => NodeClass::Noise,
        }
    }
}

/// Insertion/deletion taxonomy shared by syllables and phones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Correct,
    Missed,
    Added,
    Repeated,
    Replaced,
}

impl ErrorCode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::Correct),
            16 => Some(ErrorCode::Missed),
            32 => Some(ErrorCode::Added),
            64 => Some(ErrorCode::Repeated),
            128 => Some(ErrorCode::Replaced),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::Correct => 0,
            ErrorCode::Missed => 16,
            ErrorCode::Added => 32,
            ErrorCode::Repeated => 64,
            ErrorCode::Replaced => 128,
        }
    }
}

/// Whether a phone is an initial (consonant) or a final (vowel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceClass {
    Consonant,
    Vowel,
}

/// Phone-level pronunciation error, already interpreted for the voice class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mispronunciation {
    None,
    ConsonantInaccurate,
    VowelInaccurate,
    ToneInaccurate,
    VowelAndToneInaccurate,
    /// A non-zero sub-error the taxonomy has no name for.
    Unclassified(u32),
}

impl Mispronunciation {
    /// Interpret a raw sub-error code.
    pub fn decode(voice: VoiceClass, code: u32) -> Self {
        match (voice, code) {
            (_, 0) => Mispronunciation::None,
            (VoiceClass::Consonant, 1) => Mispronunciation::ConsonantInaccurate,
            (VoiceClass::Vowel, 1) => Mispronunciation::VowelInaccurate,
            (VoiceClass::Vowel, 2) => Mispronunciation::ToneInaccurate,
            (VoiceClass::Vowel, 3) => Mispronunciation::VowelAndToneInaccurate,
            (_, other) => Mispronunciation::Unclassified(other),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Mispronunciation::None)
    }
}

/// Engine confidence in a phone judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_level(level: u32) -> Option<Self> {
        match level {
            1 => Some(Confidence::High),
            2 => Some(Confidence::Medium),
            3 => Some(Confidence::Low),
            _ => None,
        }
    }
}

/// Scored fields of a content phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPhone {
    pub error: ErrorCode,
    pub voice: VoiceClass,
    pub mispronunciation: Mispronunciation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum PhoneKind {
    Content(ContentPhone),
    Silence,
    Noise,
}

impl PhoneKind {
    pub fn class(&self) -> NodeClass {
        match self {
            PhoneKind::Content(_) => NodeClass::Content,
            PhoneKind::Silence => NodeClass::Silence,
            PhoneKind::Noise => NodeClass::Noise,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNode {
    pub content: String,
    pub span: Span,
    pub confidence: Option<Confidence>,
    /// Tone contour reported for finals, when present.
    pub tone: Option<String>,
    pub kind: PhoneKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllableNode {
    pub content: String,
    /// Pinyin with a trailing tone digit, e.g. `de5`.
    pub symbol: String,
    pub span: Span,
    pub error: ErrorCode,
    pub class: NodeClass,
    pub phones: Vec<PhoneNode>,
}

impl SyllableNode {
    pub fn is_content(&self) -> bool {
        self.class == NodeClass::Content
    }

    pub fn pinyin_without_tone(&self) -> String {
        self.symbol.chars().filter(|c| !c.is_ascii_digit()).collect()
    }

    /// Tone number from the symbol; the neutral tone (5) is reported as 0.
    pub fn tone(&self) -> Option<u32> {
        let digit = self.symbol.chars().rev().find_map(|c| c.to_digit(10))?;
        Some(if digit == 5 { 0 } else { digit })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterNode {
    pub glyph: String,
    /// Expected pinyin; empty when the engine returned no syllable container.
    pub expected_reading: String,
    pub span: Span,
    pub syllables: Vec<SyllableNode>,
}

impl CharacterNode {
    pub fn duration_ms(&self) -> u64 {
        self.span.duration_ms()
    }

    pub fn content_syllables(&self) -> impl Iterator<Item = &SyllableNode> {
        self.syllables.iter().filter(|s| s.is_content())
    }

    pub fn silence_syllables(&self) -> impl Iterator<Item = &SyllableNode> {
        self.syllables
            .iter()
            .filter(|s| s.class == NodeClass::Silence)
    }

    /// Reading actually produced: the first content syllable's symbol.
    pub fn actual_reading(&self) -> &str {
        self.content_syllables()
            .next()
            .map(|s| s.symbol.as_str())
            .unwrap_or("")
    }
}

/// Root of a decoded evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub scores: Scores,
    /// Total audio length in engine time units.
    pub total_time: u32,
    pub is_rejected: bool,
    pub except_info: Option<String>,
    pub characters: Vec<CharacterNode>,
}

impl Utterance {
    pub fn total_duration_ms(&self) -> u64 {
        self.total_time as u64 * TIME_UNIT_MS
    }

    /// The engine's verdict when it flagged the recording as unusable, for
    /// example silence-only audio. The exception info becomes the code.
    pub fn rejection(&self) -> Option<EvalError> {
        if !self.is_rejected {
            return None;
        }
        let code = self
            .except_info
            .as_deref()
            .and_then(|info| info.parse().ok())
            .unwrap_or(0);
        let message = match &self.except_info {
            Some(info) => format!("recording rejected by engine (except_info {info})"),
            None => "recording rejected by engine".to_string(),
        };
        Some(EvalError::EngineRejection { code, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syllable(symbol: &str) -> SyllableNode {
        SyllableNode {
            content: "的".into(),
            symbol: symbol.into(),
            span: Span::default(),
            error: ErrorCode::Correct,
            class: NodeClass::Content,
            phones: vec![],
        }
    }

    #[test]
    fn span_scales_to_milliseconds() {
        let span = Span {
            begin: 12,
            end: 40,
            length: 28,
        };
        assert_eq!(span.begin_ms(), 120);
        assert_eq!(span.end_ms(), 400);
        assert_eq!(span.duration_ms(), 280);
    }

    #[test]
    fn error_codes_are_closed() {
        for code in [0, 16, 32, 64, 128] {
            assert_eq!(ErrorCode::from_code(code).unwrap().code(), code);
        }
        assert!(ErrorCode::from_code(8).is_none());
    }

    #[test]
    fn sub_error_depends_on_voice_class() {
        assert_eq!(
            Mispronunciation::decode(VoiceClass::Consonant, 1),
            Mispronunciation::ConsonantInaccurate
        );
        assert_eq!(
            Mispronunciation::decode(VoiceClass::Vowel, 1),
            Mispronunciation::VowelInaccurate
        );
        assert_eq!(
            Mispronunciation::decode(VoiceClass::Vowel, 2),
            Mispronunciation::ToneInaccurate
        );
        assert_eq!(
            Mispronunciation::decode(VoiceClass::Vowel, 3),
            Mispronunciation::VowelAndToneInaccurate
        );
        assert_eq!(
            Mispronunciation::decode(VoiceClass::Consonant, 2),
            Mispronunciation::Unclassified(2)
        );
        assert!(Mispronunciation::decode(VoiceClass::Vowel, 0).is_none());
    }

    #[test]
    fn rejected_utterance_carries_exception_code() {
        let mut utterance = Utterance::default();
        assert!(utterance.rejection().is_none());

        utterance.is_rejected = true;
        utterance.except_info = Some("28676".into());
        match utterance.rejection() {
            Some(EvalError::EngineRejection { code, message }) => {
                assert_eq!(code, 28676);
                assert!(message.contains("28676"), "{message}");
            }
            other => panic!("unexpected: {other:?}"),
        }

        utterance.except_info = None;
        assert!(matches!(
            utterance.rejection(),
            Some(EvalError::EngineRejection { code: 0, .. })
        ));
    }

    #[test]
    fn node_class_mapping() {
        assert_eq!(NodeClass::from_markup("paper"), NodeClass::Content);
        assert_eq!(NodeClass::from_markup("sil"), NodeClass::Silence);
        assert_eq!(NodeClass::from_markup("fil"), NodeClass::Noise);
        assert_eq!(NodeClass::from_markup(""), NodeClass::Noise);
    }

    #[test]
    fn tone_from_symbol() {
        assert_eq!(syllable("yi1").tone(), Some(1));
        assert_eq!(syllable("de5").tone(), Some(0));
        assert_eq!(syllable("").tone(), None);
        assert_eq!(syllable("wo3").pinyin_without_tone(), "wo");
    }
}
