//! Text generation collaborator (Gemini `generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum TextGenError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("text generation API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("text generation returned no text")]
    EmptyResponse,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`. With `json_output` the model is asked
    /// for a JSON document.
    async fn generate(&self, prompt: &str, json_output: bool) -> Result<String, TextGenError>;
}

/// Gemini REST client for one model.
pub struct GeminiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    /// * `api_url` - Base URL, e.g. [`DEFAULT_GEMINI_API_URL`].
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_url, self.model)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TextGenError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TextGenError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TextGenError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, json_output: bool) -> Result<String, TextGenError> {
        let mut body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });
        if json_output {
            body["generationConfig"] = json!({"responseMimeType": "application/json"});
        }

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let parsed: GenerateResponse = Self::parse_response(response).await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(TextGenError::EmptyResponse);
        }
        tracing::debug!(model = %self.model, chars = text.len(), "Text generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_model() {
        let client = GeminiClient::new("http://localhost:9999/", "k", "gemini-2.0-flash");
        assert_eq!(
            client.url(),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn response_text_parts_deserialize() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.as_ref().unwrap().parts.len(), 2);
    }
}
