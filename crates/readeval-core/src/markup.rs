//! Evaluation markup decoder.
//!
//! Turns the XML document returned by the engine into an [`Utterance`] tree.
//! Decoding is pure: the same input always yields a structurally identical
//! tree, and a failed decode leaves nothing behind.

use roxmltree::{Document, Node};

use crate::error::DecodeError;
use crate::model::{Category, Scores};
use crate::tree::{
    CharacterNode, Confidence, ContentPhone, ErrorCode, Mispronunciation, NodeClass, PhoneKind,
    PhoneNode, Span, SyllableNode, Utterance, VoiceClass,
};

/// Decoder for one evaluation category.
#[derive(Debug, Clone, Copy)]
pub struct MarkupDecoder {
    category: Category,
}

impl MarkupDecoder {
    pub fn new(category: Category) -> Self {
        Self { category }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Decode a markup document.
    ///
    /// A document without an evaluation root for this category decodes to an
    /// empty utterance. Malformed XML, non-numeric attributes and error codes
    /// outside the taxonomy are errors.
    pub fn decode(&self, markup: &str) -> Result<Utterance, DecodeError> {
        let doc = Document::parse(markup).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let Some(root) = evaluation_root(&doc, self.category.element_name()) else {
            tracing::debug!(
                category = %self.category,
                "no evaluation root in markup, decoding as empty"
            );
            return Ok(Utterance::default());
        };

        let scores = Scores {
            total: attr_f64(root, "total_score")?,
            phone: attr_f64(root, "phone_score")?,
            tone: attr_f64(root, "tone_score")?,
            fluency: attr_f64(root, "fluency_score")?,
            integrity: attr_f64(root, "integrity_score")?,
        };

        let characters = match self.category {
            Category::ReadSyllable => decode_sentences(root)?,
            _ => decode_words(root)?,
        };

        let utterance = Utterance {
            scores,
            total_time: attr_u32(root, "time_len")?,
            is_rejected: root
                .attribute("is_rejected")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            except_info: root
                .attribute("except_info")
                .filter(|v| !v.is_empty() && *v != "0")
                .map(str::to_string),
            characters,
        };

        tracing::debug!(
            category = %self.category,
            characters = utterance.characters.len(),
            total_score = utterance.scores.total,
            "decoded evaluation markup"
        );

        Ok(utterance)
    }
}

/// Find the scored element for `name`: under `rec_paper` when present,
/// otherwise the first element of that name carrying scores, otherwise the
/// first element of that name at all.
fn evaluation_root<'a, 'input>(doc: &'a Document<'input>, name: &str) -> Option<Node<'a, 'input>> {
    let named = |n: &Node| n.is_element() && n.tag_name().name() == name;

    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "rec_paper")
        .flat_map(|paper| paper.children())
        .find(named)
        .or_else(|| {
            doc.descendants()
                .find(|n| named(n) && n.attribute("total_score").is_some())
        })
        .or_else(|| doc.descendants().find(named))
}

fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

// One `sentence` per character; its `word` holds the syllables.
fn decode_sentences(root: Node) -> Result<Vec<CharacterNode>, DecodeError> {
    let mut characters = Vec::new();
    for sentence in elements(root, "sentence") {
        let glyph = sentence.attribute("content").unwrap_or_default();
        if glyph.is_empty() {
            continue;
        }

        let mut character = CharacterNode {
            glyph: glyph.to_string(),
            expected_reading: String::new(),
            span: span(sentence)?,
            syllables: Vec::new(),
        };

        if let Some(word) = elements(sentence, "word").next() {
            character.expected_reading = word.attribute("symbol").unwrap_or_default().to_string();
            character.syllables = decode_syllables(word)?;
        }

        characters.push(character);
    }
    Ok(characters)
}

// Word and sentence categories score whole words, each its own container.
fn decode_words(root: Node) -> Result<Vec<CharacterNode>, DecodeError> {
    let mut characters = Vec::new();
    for word in elements(root, "word") {
        let glyph = word.attribute("content").unwrap_or_default();
        if glyph.is_empty() {
            continue;
        }
        characters.push(CharacterNode {
            glyph: glyph.to_string(),
            expected_reading: word.attribute("symbol").unwrap_or_default().to_string(),
            span: span(word)?,
            syllables: decode_syllables(word)?,
        });
    }
    Ok(characters)
}

fn decode_syllables(container: Node) -> Result<Vec<SyllableNode>, DecodeError> {
    elements(container, "syll")
        .map(|syll| -> Result<SyllableNode, DecodeError> {
            let phones = elements(syll, "phone")
                .map(decode_phone)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SyllableNode {
                content: syll.attribute("content").unwrap_or_default().to_string(),
                symbol: syll.attribute("symbol").unwrap_or_default().to_string(),
                span: span(syll)?,
                error: error_code(syll)?,
                class: NodeClass::from_markup(syll.attribute("rec_node_type").unwrap_or_default()),
                phones,
            })
        })
        .collect()
}

fn decode_phone(phone: Node) -> Result<PhoneNode, DecodeError> {
    let kind = match NodeClass::from_markup(phone.attribute("rec_node_type").unwrap_or_default()) {
        NodeClass::Content => {
            let voice = if attr_u32(phone, "is_yun")? == 1 {
                VoiceClass::Vowel
            } else {
                VoiceClass::Consonant
            };
            PhoneKind::Content(ContentPhone {
                error: error_code(phone)?,
                voice,
                mispronunciation: Mispronunciation::decode(voice, attr_u32(phone, "perr_msg")?),
            })
        }
        NodeClass::Silence => PhoneKind::Silence,
        NodeClass::Noise => PhoneKind::Noise,
    };

    Ok(PhoneNode {
        content: phone.attribute("content").unwrap_or_default().to_string(),
        span: span(phone)?,
        confidence: Confidence::from_level(attr_u32(phone, "perr_level_msg")?),
        tone: phone
            .attribute("mono_tone")
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        kind,
    })
}

fn span(node: Node) -> Result<Span, DecodeError> {
    Ok(Span {
        begin: attr_u32(node, "beg_pos")?,
        end: attr_u32(node, "end_pos")?,
        length: attr_u32(node, "time_len")?,
    })
}

fn error_code(node: Node) -> Result<ErrorCode, DecodeError> {
    let code = attr_u32(node, "dp_message")?;
    ErrorCode::from_code(code).ok_or_else(|| DecodeError::UnknownErrorCode {
        element: node.tag_name().name().to_string(),
        code,
    })
}

fn attr_u32(node: Node, name: &str) -> Result<u32, DecodeError> {
    match node.attribute(name).map(str::trim) {
        None | Some("") => Ok(0),
        Some(v) => v.parse().map_err(|_| invalid_number(node, name, v)),
    }
}

fn attr_f64(node: Node, name: &str) -> Result<f64, DecodeError> {
    match node.attribute(name).map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| invalid_number(node, name, v)),
    }
}

fn invalid_number(node: Node, attribute: &str, value: &str) -> DecodeError {
    DecodeError::InvalidNumber {
        element: node.tag_name().name().to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}
