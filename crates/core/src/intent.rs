//! Intent results, keyword heuristics, and model-output parsing.
//!
//! The model-backed extractor lives in the pipeline crate; this module
//! holds the pure parts so they can be tested in isolation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog::{self, describe_for_prompt};
use crate::types::Params;
use crate::uploads::{FileClass, UploadedFile};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Results below this confidence are not acted upon.
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Heuristic confidence: merge a video with an audio track.
pub const HEURISTIC_MERGE_CONFIDENCE: f64 = 0.7;
/// Heuristic confidence: transcription.
pub const HEURISTIC_TRANSCRIBE_CONFIDENCE: f64 = 0.7;
/// Heuristic confidence: web page screenshot.
pub const HEURISTIC_SCREENSHOT_CONFIDENCE: f64 = 0.7;
/// Heuristic confidence: MP3 conversion.
pub const HEURISTIC_MP3_CONFIDENCE: f64 = 0.6;
/// Heuristic confidence: API test probe.
pub const HEURISTIC_TEST_CONFIDENCE: f64 = 0.9;
/// Heuristic confidence: joining several uploaded audio files.
pub const HEURISTIC_AUDIO_CONCAT_CONFIDENCE: f64 = 0.8;

const JOIN_KEYWORDS: &[&str] = &[
    "zusammen", "füge", "merge", "combine", "join", "concat", "verbinde", "hintereinander",
];
const TRANSCRIBE_KEYWORDS: &[&str] = &["transkript", "transkribier", "transcribe", "transcript", "untertitel"];
const SCREENSHOT_KEYWORDS: &[&str] = &["screenshot", "capture", "bildschirmfoto"];
const MP3_KEYWORDS: &[&str] = &["mp3", "konvertier", "convert"];
const TEST_KEYWORDS: &[&str] = &["test", "teste", "ping", "status"];

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which path produced an intent result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    Model,
    Heuristic,
}

/// Structured interpretation of a user request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    /// Operation identifier, possibly an alias. `None` when nothing matched.
    pub endpoint: Option<String>,
    #[serde(default)]
    pub params: Params,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    pub source: IntentSource,
}

impl IntentResult {
    pub fn none(reasoning: impl Into<String>, source: IntentSource) -> Self {
        Self {
            endpoint: None,
            params: Params::new(),
            confidence: 0.0,
            reasoning: reasoning.into(),
            source,
        }
    }

    /// Whether the result names an operation with enough confidence to run.
    pub fn is_actionable(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
            && self.confidence >= CONFIDENCE_THRESHOLD
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

/// Keyword-based fallback used when no model is configured or the model
/// output is unusable. Rules are checked in a fixed priority order.
pub fn heuristic_intent(message: &str, uploads: &[UploadedFile]) -> IntentResult {
    let lower = message.to_lowercase();
    let urls: Vec<&str> = URL_RE.find_iter(message).map(|m| m.as_str()).collect();
    let has = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    let audio: Vec<&UploadedFile> = uploads.iter().filter(|f| f.file_type == FileClass::Audio).collect();
    let video: Vec<&UploadedFile> = uploads.iter().filter(|f| f.file_type == FileClass::Video).collect();
    let first_media = || {
        uploads
            .first()
            .map(|f| f.url.clone())
            .or_else(|| urls.first().map(|u| (*u).to_string()))
            .unwrap_or_default()
    };

    if audio.len() >= 2 && video.is_empty() && has(JOIN_KEYWORDS) {
        let audio_urls: Vec<Value> = audio.iter().map(|f| json!(f.url)).collect();
        return heuristic(
            catalog::ENDPOINT_AUDIO_CONCATENATE,
            json!({ "audio_urls": audio_urls }),
            HEURISTIC_AUDIO_CONCAT_CONFIDENCE,
            "Keyword match: join several audio files",
        );
    }

    if has(JOIN_KEYWORDS) {
        let (video_url, audio_url) = if !uploads.is_empty() {
            (
                video.first().map(|f| f.url.clone()).unwrap_or_default(),
                audio.first().map(|f| f.url.clone()).unwrap_or_default(),
            )
        } else if urls.len() >= 2 {
            (urls[0].to_string(), urls[1].to_string())
        } else {
            (String::new(), String::new())
        };
        return heuristic(
            catalog::ENDPOINT_AUDIO_MIXING,
            json!({ "video_url": video_url, "audio_url": audio_url }),
            HEURISTIC_MERGE_CONFIDENCE,
            "Keyword match: add audio to video",
        );
    }

    if has(TRANSCRIBE_KEYWORDS) {
        let language = if has(&["englisch", "english"]) { "en" } else { "de" };
        return heuristic(
            catalog::ENDPOINT_TRANSCRIBE,
            json!({ "media_url": first_media(), "language": language }),
            HEURISTIC_TRANSCRIBE_CONFIDENCE,
            "Keyword match: transcription",
        );
    }

    if has(SCREENSHOT_KEYWORDS) {
        return heuristic(
            catalog::ENDPOINT_WEBPAGE_SCREENSHOT,
            json!({
                "url": urls.first().copied().unwrap_or_default(),
                "viewport_width": crate::browser::DEFAULT_VIEWPORT_WIDTH,
                "viewport_height": crate::browser::DEFAULT_VIEWPORT_HEIGHT,
            }),
            HEURISTIC_SCREENSHOT_CONFIDENCE,
            "Keyword match: web page screenshot",
        );
    }

    if has(MP3_KEYWORDS) {
        return heuristic(
            catalog::ENDPOINT_MEDIA_TO_MP3,
            json!({ "media_url": first_media() }),
            HEURISTIC_MP3_CONFIDENCE,
            "Keyword match: MP3 conversion",
        );
    }

    if has(TEST_KEYWORDS) {
        return heuristic(
            catalog::ENDPOINT_TOOLKIT_TEST,
            json!({}),
            HEURISTIC_TEST_CONFIDENCE,
            "Keyword match: API test",
        );
    }

    IntentResult::none("No keyword matched", IntentSource::Heuristic)
}

fn heuristic(endpoint: &str, params: Value, confidence: f64, reasoning: &str) -> IntentResult {
    IntentResult {
        endpoint: Some(endpoint.to_string()),
        params: params.as_object().cloned().unwrap_or_default(),
        confidence,
        reasoning: reasoning.to_string(),
        source: IntentSource::Heuristic,
    }
}

// ---------------------------------------------------------------------------
// Model prompt and output
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IntentParseError {
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output has an invalid confidence: {0}")]
    InvalidConfidence(f64),
}

#[derive(Deserialize)]
struct ModelIntent {
    endpoint: Option<String>,
    #[serde(default)]
    params: Option<Params>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// Parse the JSON object a model returned. Markdown code fences around the
/// object are tolerated.
pub fn parse_model_output(text: &str) -> Result<IntentResult, IntentParseError> {
    let body = strip_code_fence(text);
    let parsed: ModelIntent = serde_json::from_str(body)?;

    if !(0.0..=1.0).contains(&parsed.confidence) || parsed.confidence.is_nan() {
        return Err(IntentParseError::InvalidConfidence(parsed.confidence));
    }

    Ok(IntentResult {
        endpoint: parsed.endpoint.filter(|e| !e.trim().is_empty()),
        params: parsed.params.unwrap_or_default(),
        confidence: parsed.confidence,
        reasoning: parsed.reasoning,
        source: IntentSource::Model,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Build the extraction prompt for a message and its uploads.
pub fn build_prompt(message: &str, uploads: &[UploadedFile]) -> String {
    let mut prompt = String::from(
        "You extract API calls for a media processing toolkit.\n\
         Pick the single best endpoint for the user's request and fill in its parameters.\n\
         Refer to uploaded files with USE_UPLOADED_FILE_<index> (0-based) instead of their URL.\n\
         Extract URLs from the message. Use sensible defaults for optional parameters.\n\
         Answer with one JSON object only:\n\
         {\"endpoint\": \"/...\", \"params\": {...}, \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}\n\
         If no endpoint fits, answer with \"endpoint\": null and confidence 0.\n\n",
    );
    prompt.push_str(&describe_for_prompt());
    prompt.push_str(&format!("User message: {message}\n"));

    if !uploads.is_empty() {
        prompt.push_str("\nUploaded files:\n");
        for (i, file) in uploads.iter().enumerate() {
            prompt.push_str(&format!(
                "  {i}. {} ({}, {} bytes)\n     URL: {}\n",
                file.filename,
                file.file_type.as_str(),
                file.size,
                file.url
            ));
        }
    }
    prompt
}
