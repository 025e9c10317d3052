//! Scenario definitions: named, straight-line pipelines of steps.
//!
//! Scenario files are a JSON object keyed by scenario id. Unknown step
//! types and unknown local function names are rejected while parsing, so a
//! bad file never reaches execution.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered scenario set as stored on disk.
pub type ScenarioMap = IndexMap<String, Scenario>;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("invalid scenario file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("scenario file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario '{scenario}' has no steps")]
    NoSteps { scenario: String },

    #[error("scenario '{scenario}' has a step without an id")]
    MissingStepId { scenario: String },

    #[error("scenario '{scenario}' has duplicate step id '{step_id}'")]
    DuplicateStepId { scenario: String, step_id: String },

    #[error("scenario '{scenario}' step '{step_id}': {message}")]
    InvalidStep {
        scenario: String,
        step_id: String,
        message: String,
    },

    #[error("scenario id must not be empty")]
    EmptyId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Names of the inputs the caller is expected to supply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    /// Parameter template; `{{...}}` tokens are resolved at run time.
    #[serde(default = "empty_object")]
    pub params: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Call the remote backend directly.
    #[serde(alias = "nca_api")]
    RemoteCall { endpoint: String },
    /// Generate text from a prompt template.
    #[serde(alias = "llm_task")]
    TextTask { prompt: String },
    /// Run one of the built-in local executors.
    LocalTask { function: LocalFunction },
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RemoteCall { .. } => "remote_call",
            Self::TextTask { .. } => "text_task",
            Self::LocalTask { .. } => "local_task",
        }
    }
}

/// Closed set of local executor functions a scenario may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalFunction {
    LocalAudioMixing,
    LocalAudioConcat,
    CreateThumbnail,
    CreateWebsiteScreenshot,
    CreateVideoFromImageAndAudio,
}

impl LocalFunction {
    pub const ALL: [Self; 5] = [
        Self::LocalAudioMixing,
        Self::LocalAudioConcat,
        Self::CreateThumbnail,
        Self::CreateWebsiteScreenshot,
        Self::CreateVideoFromImageAndAudio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalAudioMixing => "local_audio_mixing",
            Self::LocalAudioConcat => "local_audio_concat",
            Self::CreateThumbnail => "create_thumbnail",
            Self::CreateWebsiteScreenshot => "create_website_screenshot",
            Self::CreateVideoFromImageAndAudio => "create_video_from_image_and_audio",
        }
    }
}

impl std::fmt::Display for LocalFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parsing and validation
// ---------------------------------------------------------------------------

/// Parse and validate a scenario file.
pub fn parse_scenarios(json: &str) -> Result<ScenarioMap, ScenarioError> {
    let map: ScenarioMap = serde_json::from_str(json)?;
    validate_all(&map)?;
    Ok(map)
}

pub fn validate_all(map: &ScenarioMap) -> Result<(), ScenarioError> {
    for (id, scenario) in map {
        validate_scenario(id, scenario)?;
    }
    Ok(())
}

/// Structural checks that serde cannot express.
pub fn validate_scenario(id: &str, scenario: &Scenario) -> Result<(), ScenarioError> {
    if id.trim().is_empty() {
        return Err(ScenarioError::EmptyId);
    }
    if scenario.steps.is_empty() {
        return Err(ScenarioError::NoSteps {
            scenario: id.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for step in &scenario.steps {
        if step.id.trim().is_empty() {
            return Err(ScenarioError::MissingStepId {
                scenario: id.to_string(),
            });
        }
        if !seen.insert(step.id.as_str()) {
            return Err(ScenarioError::DuplicateStepId {
                scenario: id.to_string(),
                step_id: step.id.clone(),
            });
        }

        let invalid = |message: &str| ScenarioError::InvalidStep {
            scenario: id.to_string(),
            step_id: step.id.clone(),
            message: message.to_string(),
        };
        match &step.kind {
            StepKind::RemoteCall { endpoint } if endpoint.trim().is_empty() => {
                return Err(invalid("endpoint must not be empty"));
            }
            StepKind::TextTask { prompt } if prompt.trim().is_empty() => {
                return Err(invalid("prompt must not be empty"));
            }
            StepKind::RemoteCall { .. } | StepKind::LocalTask { .. } if !step.params.is_object() => {
                return Err(invalid("params must be an object"));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    const SAMPLE: &str = r#"{
        "podcast_recap": {
            "name": "Podcast recap",
            "inputs": ["audio_url", "image_url"],
            "steps": [
                {"id": "transcript", "type": "nca_api", "endpoint": "/transcribe",
                 "params": {"media_url": "{{audio_url}}"}},
                {"id": "summary", "type": "llm_task", "prompt": "Summarise: {{transcript.response}}"},
                {"id": "video", "type": "local_task", "function": "create_video_from_image_and_audio",
                 "params": {"image_url": "{{image_url}}", "audio_url": "{{audio_url}}"}}
            ]
        },
        "probe": {
            "name": "Probe",
            "steps": [{"id": "t", "type": "remote_call", "endpoint": "/v1/toolkit/test"}]
        }
    }"#;

    #[test]
    fn parses_legacy_type_names_and_keeps_order() {
        let map = parse_scenarios(SAMPLE).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["podcast_recap", "probe"]);

        let steps = &map["podcast_recap"].steps;
        assert_eq!(
            steps[0].kind,
            StepKind::RemoteCall {
                endpoint: "/transcribe".into()
            }
        );
        assert_matches!(steps[1].kind, StepKind::TextTask { .. });
        assert_eq!(
            steps[2].kind,
            StepKind::LocalTask {
                function: LocalFunction::CreateVideoFromImageAndAudio
            }
        );
        assert_eq!(map["probe"].steps[0].params, json!({}));
    }

    #[test]
    fn serializes_canonical_type_names() {
        let map = parse_scenarios(SAMPLE).unwrap();
        let out = serde_json::to_value(&map["podcast_recap"].steps[0]).unwrap();
        assert_eq!(out["type"], json!("remote_call"));
        assert_eq!(out["endpoint"], json!("/transcribe"));
    }

    #[test]
    fn unknown_local_function_fails_at_load() {
        let json = r#"{"s": {"name": "s", "steps": [
            {"id": "a", "type": "local_task", "function": "rm_rf"}]}}"#;
        assert_matches!(parse_scenarios(json), Err(ScenarioError::Parse(_)));
    }

    #[test]
    fn unknown_step_type_fails_at_load() {
        let json = r#"{"s": {"name": "s", "steps": [{"id": "a", "type": "teleport"}]}}"#;
        assert_matches!(parse_scenarios(json), Err(ScenarioError::Parse(_)));
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let json = r#"{"s": {"name": "s", "steps": [
            {"id": "a", "type": "text_task", "prompt": "x"},
            {"id": "a", "type": "text_task", "prompt": "y"}]}}"#;
        assert_matches!(
            parse_scenarios(json),
            Err(ScenarioError::DuplicateStepId { step_id, .. }) if step_id == "a"
        );
    }

    #[test]
    fn empty_scenario_and_blank_fields_are_rejected() {
        let json = r#"{"s": {"name": "s", "steps": []}}"#;
        assert_matches!(parse_scenarios(json), Err(ScenarioError::NoSteps { .. }));

        let json = r#"{"s": {"name": "s", "steps": [{"id": "a", "type": "remote_call", "endpoint": " "}]}}"#;
        assert_matches!(parse_scenarios(json), Err(ScenarioError::InvalidStep { .. }));

        let json = r#"{"s": {"name": "s", "steps": [
            {"id": "a", "type": "local_task", "function": "create_thumbnail", "params": "x"}]}}"#;
        assert_matches!(parse_scenarios(json), Err(ScenarioError::InvalidStep { .. }));
    }

    #[test]
    fn local_function_names_round_trip_through_serde() {
        for f in LocalFunction::ALL {
            let value = serde_json::to_value(f).unwrap();
            assert_eq!(value, json!(f.as_str()));
        }
    }
}
