//! JSON wire messages exchanged with the engine.

use serde::{Deserialize, Serialize};

use readeval_core::model::EvaluationRequest;

/// Byte-order mark the engine expects in front of the target text.
pub const TEXT_BOM: char = '\u{feff}';

/// Outer flag on the first audio frame.
pub const AUS_FIRST: u8 = 1;
/// Outer flag on every frame between first and last.
pub const AUS_CONTINUE: u8 = 2;
/// Outer flag on the last audio frame.
pub const AUS_LAST: u8 = 4;

/// Inner status on the parameter frame.
pub const STATUS_BEGIN: u8 = 0;
/// Inner status on every audio frame except the last.
pub const STATUS_CONTINUE: u8 = 1;
/// Inner status on the last audio frame, and on the terminal response.
pub const STATUS_END: u8 = 2;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Common {
    pub app_id: String,
}

/// Session-opening business parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionBusiness {
    pub category: String,
    pub rstcd: String,
    pub sub: String,
    pub group: String,
    pub ent: String,
    pub tte: String,
    pub cmd: String,
    pub auf: String,
    pub aue: String,
    pub text: String,
    pub extra_ability: String,
    pub rst: String,
    pub ise_unite: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameData {
    pub status: u8,
    pub data: String,
}

/// The one control message sent before any audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterFrame {
    pub common: Common,
    pub business: SessionBusiness,
    pub data: FrameData,
}

impl ParameterFrame {
    pub fn new(app_id: &str, request: &EvaluationRequest) -> Self {
        Self {
            common: Common {
                app_id: app_id.to_string(),
            },
            business: SessionBusiness {
                category: request.category.element_name().to_string(),
                rstcd: "utf8".into(),
                sub: "ise".into(),
                group: request.profile.group.clone(),
                ent: request.profile.language.clone(),
                tte: "utf-8".into(),
                cmd: "ssb".into(),
                auf: format!("audio/L16;rate={}", request.sample_rate),
                aue: request.audio_format.clone(),
                text: format!("{TEXT_BOM}{}", request.text),
                extra_ability: "multi_dimension".into(),
                rst: "entirety".into(),
                ise_unite: "1".into(),
            },
            data: FrameData {
                status: STATUS_BEGIN,
                data: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioBusiness {
    pub cmd: String,
    pub aus: u8,
    pub aue: String,
}

/// One chunk of base64-encoded audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioFrame {
    pub business: AudioBusiness,
    pub data: FrameData,
}

impl AudioFrame {
    pub fn new(aus: u8, status: u8, encoded: String) -> Self {
        Self {
            business: AudioBusiness {
                cmd: "auw".into(),
                aus,
                aue: "raw".into(),
            },
            data: FrameData {
                status,
                data: encoded,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseData {
    #[serde(default)]
    pub status: u8,
    /// Base64-encoded markup, present on the terminal message.
    #[serde(default)]
    pub data: Option<String>,
}

/// Any message the engine sends back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub data: Option<ResponseData>,
}

impl EngineResponse {
    /// `true` for the final result message.
    pub fn is_terminal(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.status == STATUS_END)
    }

    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readeval_core::model::Category;
    use serde_json::json;

    #[test]
    fn parameter_frame_shape() {
        let request = EvaluationRequest::new(Category::ReadSyllable, "的 一 了");
        let frame = ParameterFrame::new("app123", &request);
        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(value["common"]["app_id"], "app123");
        assert_eq!(value["business"]["category"], "read_syllable");
        assert_eq!(value["business"]["cmd"], "ssb");
        assert_eq!(value["business"]["auf"], "audio/L16;rate=16000");
        assert_eq!(value["business"]["group"], "pupil");
        assert_eq!(value["business"]["ent"], "cn_vip");
        assert_eq!(value["business"]["text"], "\u{feff}的 一 了");
        assert_eq!(value["data"], json!({"status": 0, "data": ""}));
    }

    #[test]
    fn audio_frame_shape() {
        let frame = AudioFrame::new(AUS_LAST, STATUS_END, "AAAA".into());
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "business": {"cmd": "auw", "aus": 4, "aue": "raw"},
                "data": {"status": 2, "data": "AAAA"}
            })
        );
    }

    #[test]
    fn responses_parse_with_missing_fields() {
        let progress: EngineResponse =
            serde_json::from_str(r#"{"code":0,"message":"success","sid":"s1","data":{"status":1}}"#)
                .unwrap();
        assert!(!progress.is_terminal());

        let done: EngineResponse =
            serde_json::from_str(r#"{"code":0,"data":{"status":2,"data":"PHhtbC8+"}}"#).unwrap();
        assert!(done.is_terminal());
        assert_eq!(done.data.unwrap().data.as_deref(), Some("PHhtbC8+"));

        let rejected: EngineResponse =
            serde_json::from_str(r#"{"code":10163,"message":"param error","sid":"s2"}"#).unwrap();
        assert!(rejected.is_error());
        assert!(!rejected.is_terminal());
    }
}
