//! Request and response bodies exchanged with the counselling backend.
//!
//! The chat endpoint has answered in two layouts over its lifetime. Both are
//! modelled as separate structs, classified into [`ChatResponseWire`] and
//! folded into one [`ChatResponseFormatted`] by [`normalize`]. Nothing else in
//! the crate looks at the raw layouts.

use super::ApiError;
use crate::ids::prefixed_id;
use crate::locale::Language;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const DEFAULT_EMOTION: &str = "neutral";
const DEFAULT_SCORE: f64 = 0.5;

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub user_id: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionData {
    pub label: String,
    pub confidence: f64,
    pub intensity: f64,
    #[serde(default)]
    pub secondary: Vec<String>,
}

impl Default for EmotionData {
    fn default() -> Self {
        Self {
            label: DEFAULT_EMOTION.to_string(),
            confidence: DEFAULT_SCORE,
            intensity: DEFAULT_SCORE,
            secondary: Vec::new(),
        }
    }
}

/// Canonical chat reply, independent of the backend's response layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponseFormatted {
    pub session_id: String,
    pub response_text: String,
    pub emotion: EmotionData,
    pub is_crisis: bool,
    pub suggested_techniques: Vec<String>,
    pub safety_resources: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V1Emotion {
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub intensity: Option<f64>,
    pub secondary: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V1ChatResponse {
    pub session_id: Option<String>,
    pub response: Option<String>,
    pub emotion: Option<V1Emotion>,
    pub is_crisis: Option<bool>,
    pub suggested_techniques: Option<Vec<String>>,
    pub safety_resources: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V3EmotionAnalysis {
    pub primary_emotion: Option<String>,
    pub intensity: Option<f64>,
    pub secondary_emotions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupervisorFeedback {
    #[serde(default)]
    pub intervention_needed: bool,
    pub quality_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V3ChatResponse {
    pub session_id: Option<String>,
    pub response_text: Option<String>,
    /// Some v3 deployments still fill the v1 text field.
    pub response: Option<String>,
    pub emotion_analysis: Option<V3EmotionAnalysis>,
    pub supervisor_feedback: Option<SupervisorFeedback>,
    pub suggested_techniques: Option<Vec<String>>,
    pub safety_resources: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
pub enum ChatResponseWire {
    V1(V1ChatResponse),
    V3(V3ChatResponse),
}

impl ChatResponseWire {
    pub fn parse(body: &str) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| ApiError::MalformedResponse(format!("invalid JSON: {err}")))?;
        let Some(object) = value.as_object() else {
            return Err(ApiError::MalformedResponse(
                "chat response is not a JSON object".to_string(),
            ));
        };

        let is_v3 = object.contains_key("response_text") || object.contains_key("emotion_analysis");
        let parsed = if is_v3 {
            serde_json::from_value(value).map(Self::V3)
        } else {
            serde_json::from_value(value).map(Self::V1)
        };
        parsed.map_err(|err| ApiError::MalformedResponse(err.to_string()))
    }
}

/// Fold either response layout into the canonical record.
///
/// `fallback_session` is used when the backend omits `session_id`; without
/// one a client-side placeholder is generated.
pub fn normalize(
    wire: ChatResponseWire,
    fallback_session: Option<&str>,
) -> Result<ChatResponseFormatted, ApiError> {
    let (session_id, text, emotion, is_crisis, techniques, safety_resources) = match wire {
        ChatResponseWire::V3(v3) => {
            let analysis = v3.emotion_analysis.unwrap_or_default();
            let intensity = analysis.intensity.unwrap_or(DEFAULT_SCORE);
            let emotion = EmotionData {
                label: non_empty(analysis.primary_emotion)
                    .unwrap_or_else(|| DEFAULT_EMOTION.to_string()),
                confidence: intensity,
                intensity,
                secondary: analysis.secondary_emotions.unwrap_or_default(),
            };
            let is_crisis = v3
                .supervisor_feedback
                .map(|feedback| feedback.intervention_needed)
                .unwrap_or(false);
            (
                v3.session_id,
                non_empty(v3.response_text).or_else(|| non_empty(v3.response)),
                emotion,
                is_crisis,
                v3.suggested_techniques,
                v3.safety_resources,
            )
        }
        ChatResponseWire::V1(v1) => {
            let raw = v1.emotion.unwrap_or_default();
            let emotion = EmotionData {
                label: non_empty(raw.label).unwrap_or_else(|| DEFAULT_EMOTION.to_string()),
                confidence: raw.confidence.unwrap_or(DEFAULT_SCORE),
                intensity: raw.intensity.unwrap_or(DEFAULT_SCORE),
                secondary: raw.secondary.unwrap_or_default(),
            };
            (
                v1.session_id,
                non_empty(v1.response),
                emotion,
                v1.is_crisis.unwrap_or(false),
                v1.suggested_techniques,
                v1.safety_resources,
            )
        }
    };

    let response_text = text.ok_or_else(|| {
        ApiError::MalformedResponse("chat response carries no reply text".to_string())
    })?;
    let session_id = non_empty(session_id)
        .or_else(|| fallback_session.map(str::to_string))
        .unwrap_or_else(|| prefixed_id("session"));

    Ok(ChatResponseFormatted {
        session_id,
        response_text,
        emotion,
        is_crisis,
        suggested_techniques: techniques.unwrap_or_default(),
        safety_resources,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Serialize)]
pub struct AnonymousAuthRequest<'a> {
    pub device_id: &'a str,
    pub language: Language,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnonymousAuthResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub anonymous_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub total_turns: u32,
    pub dominant_emotion: String,
    #[serde(default)]
    pub emotion_distribution: BTreeMap<String, f64>,
    #[serde(default)]
    pub crisis_detected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: String,
}
