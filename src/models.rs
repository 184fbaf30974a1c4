//! Data models and structures
//!
//! Defines the content payloads flowing into the analysis service, the
//! normalized results flowing out of it, session state, and configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which prompt template and response schema apply to a piece of content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Text,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Image => write!(f, "image"),
            ContentKind::Text => write!(f, "text"),
        }
    }
}

/// Canonical content handed to the dispatcher.
///
/// `data` is a base64 data URI for images and decoded text for text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPayload {
    kind: ContentKind,
    data: String,
}

impl ContentPayload {
    pub fn new(kind: ContentKind, data: String) -> Self {
        Self { kind, data }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredImageResult {
    pub color_contrast: String,
    pub visual_complexity: String,
    pub pattern_density: String,
    pub sensory_load: String,
    pub text_legibility: String,
    pub recommendations: String,
    pub overall_suitability: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredTextResult {
    pub readability: String,
    pub clarity: String,
    pub potential_for_misinterpretation: String,
    pub structure: String,
    pub recommendations: String,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlainTextResult {
    pub analysis_result: String,
}

/// Outcome of a successful analysis. Exactly one variant is produced per
/// request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NormalizedResult {
    Image(StructuredImageResult),
    Text(StructuredTextResult),
    Plain(PlainTextResult),
}

impl NormalizedResult {
    /// The single "overall" string used for the sentiment verdict.
    pub fn overall(&self) -> &str {
        match self {
            NormalizedResult::Image(result) => &result.overall_suitability,
            NormalizedResult::Text(result) => &result.overall_assessment,
            NormalizedResult::Plain(result) => &result.analysis_result,
        }
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, NormalizedResult::Plain(_))
    }

    /// Labelled sections in display order.
    pub fn sections(&self) -> Vec<(&'static str, &str)> {
        match self {
            NormalizedResult::Image(r) => vec![
                ("Color contrast", r.color_contrast.as_str()),
                ("Visual complexity", r.visual_complexity.as_str()),
                ("Pattern density", r.pattern_density.as_str()),
                ("Sensory load", r.sensory_load.as_str()),
                ("Text legibility", r.text_legibility.as_str()),
                ("Recommendations", r.recommendations.as_str()),
                ("Overall suitability", r.overall_suitability.as_str()),
            ],
            NormalizedResult::Text(r) => vec![
                ("Readability", r.readability.as_str()),
                ("Clarity", r.clarity.as_str()),
                (
                    "Potential for misinterpretation",
                    r.potential_for_misinterpretation.as_str(),
                ),
                ("Structure", r.structure.as_str()),
                ("Recommendations", r.recommendations.as_str()),
                ("Overall assessment", r.overall_assessment.as_str()),
            ],
            NormalizedResult::Plain(r) => vec![("Assessment", r.analysis_result.as_str())],
        }
    }
}

/// Whether the current user is authenticated against the analysis service.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SignInStatus {
    SignedIn,
    SignedOut,
    Unknown,
}

/// Snapshot taken right before each dispatch. Never cached across requests.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub service_ready: bool,
    pub signed_in: SignInStatus,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub ready_grace: Duration,
}

pub const API_KEY_VAR: &str = "NEUROCHECK_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_READY_GRACE_MS: u64 = 1500;

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let ready_grace_ms = match std::env::var("NEUROCHECK_READY_GRACE_MS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                crate::Error::Config(format!(
                    "NEUROCHECK_READY_GRACE_MS must be a whole number of milliseconds, got '{}'",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_READY_GRACE_MS,
        };

        Ok(Self {
            api_key: std::env::var(API_KEY_VAR)
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: std::env::var("NEUROCHECK_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("NEUROCHECK_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            ready_grace: Duration::from_millis(ready_grace_ms),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            ready_grace: Duration::from_millis(DEFAULT_READY_GRACE_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_serialization() {
        let json = serde_json::to_string(&ContentKind::Image).unwrap();
        assert_eq!(json, "\"image\"");
        assert_eq!(ContentKind::Text.to_string(), "text");
    }

    #[test]
    fn test_image_result_uses_camel_case_keys() {
        let result: StructuredImageResult = serde_json::from_value(serde_json::json!({
            "colorContrast": "a",
            "visualComplexity": "b",
            "patternDensity": "c",
            "sensoryLoad": "d",
            "textLegibility": "e",
            "recommendations": "f",
            "overallSuitability": "g"
        }))
        .unwrap();

        assert_eq!(result.color_contrast, "a");
        assert_eq!(result.overall_suitability, "g");
    }

    #[test]
    fn test_text_result_rejects_missing_field() {
        let result: Result<StructuredTextResult, _> = serde_json::from_value(serde_json::json!({
            "readability": "a",
            "overallAssessment": "b"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_overall_picks_variant_field() {
        let plain = NormalizedResult::Plain(PlainTextResult {
            analysis_result: "fine".to_string(),
        });
        assert_eq!(plain.overall(), "fine");
        assert!(!plain.is_structured());
        assert_eq!(plain.sections().len(), 1);
    }

    #[test]
    fn test_plain_result_serializes_analysis_result_key() {
        let plain = NormalizedResult::Plain(PlainTextResult {
            analysis_result: "fine".to_string(),
        });
        let json = serde_json::to_value(&plain).unwrap();
        assert_eq!(json["type"], "plain");
        assert_eq!(json["analysisResult"], "fine");
    }
}
