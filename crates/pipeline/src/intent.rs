//! Intent extraction: model-backed with a keyword fallback.

use std::sync::Arc;

use async_trait::async_trait;
use mediaflow_core::intent::{build_prompt, heuristic_intent, parse_model_output, IntentResult};
use mediaflow_core::uploads::UploadedFile;

use crate::text_gen::TextGenerator;

/// Turns a user message and its uploads into an operation request.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, message: &str, uploads: &[UploadedFile]) -> IntentResult;
}

/// Model-backed extraction with keyword heuristics as the fallback.
///
/// Without a generator every request goes through the heuristics. The
/// result's `source` tells which path answered.
pub struct ModelIntentExtractor {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ModelIntentExtractor {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub fn heuristic_only() -> Self {
        Self { generator: None }
    }
}

#[async_trait]
impl IntentExtractor for ModelIntentExtractor {
    async fn extract(&self, message: &str, uploads: &[UploadedFile]) -> IntentResult {
        let Some(generator) = &self.generator else {
            return heuristic_intent(message, uploads);
        };

        let prompt = build_prompt(message, uploads);
        let text = match generator.generate(&prompt, true).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Intent model unavailable, using keyword heuristics");
                return heuristic_intent(message, uploads);
            }
        };

        match parse_model_output(&text) {
            Ok(result) => {
                tracing::info!(
                    endpoint = ?result.endpoint,
                    confidence = result.confidence,
                    "Intent recognized by model"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unusable intent model output, using keyword heuristics");
                heuristic_intent(message, uploads)
            }
        }
    }
}
