//! Local override router.
//!
//! Decides per canonical operation and parameter shape whether a local
//! executor runs instead of the remote backend. Rules, in priority order:
//!
//! 1. audio concatenation, when ffmpeg is present
//! 2. audio/video mixing, when ffmpeg is present
//! 3. any `thumbnail` / `screenshot` operation: a video subject gets a frame
//!    grab, a non-audio http(s) subject gets a browser capture
//!
//! A claimed operation never falls back to the remote backend.

use mediaflow_core::catalog::{ENDPOINT_AUDIO_CONCATENATE, ENDPOINT_AUDIO_MIXING};
use mediaflow_core::media::{is_audio_reference, is_http_url, is_video_reference};
use mediaflow_core::types::Params;
use serde_json::Value;

use crate::error::LocalTaskError;
use crate::local::{ConcatArgs, LocalExecutor, MixArgs, ScreenshotArgs, ThumbnailArgs};

/// Parameters probed, in order, for the subject of a thumbnail/screenshot.
const SUBJECT_KEYS: &[&str] = &["video_url", "url", "media_url"];

/// A local execution the router has taken over.
#[derive(Debug, Clone)]
pub enum LocalClaim {
    Concat(ConcatArgs),
    Mix(MixArgs),
    Thumbnail(ThumbnailArgs),
    Screenshot(ScreenshotArgs),
}

impl LocalClaim {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Concat(_) => "concat",
            Self::Mix(_) => "mix",
            Self::Thumbnail(_) => "thumbnail",
            Self::Screenshot(_) => "screenshot",
        }
    }
}

#[derive(Clone)]
pub struct LocalOverrideRouter {
    executor: LocalExecutor,
}

impl LocalOverrideRouter {
    pub fn new(executor: LocalExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &LocalExecutor {
        &self.executor
    }

    /// Whether a local executor should handle `endpoint` (canonical) with
    /// `params`. `None` means the remote backend gets the call.
    pub async fn claim(&self, endpoint: &str, params: &Params) -> Option<LocalClaim> {
        if endpoint == ENDPOINT_AUDIO_CONCATENATE {
            let args = audio_list(params)?;
            return self
                .ffmpeg_present(endpoint)
                .await
                .then_some(LocalClaim::Concat(args));
        }

        if endpoint == ENDPOINT_AUDIO_MIXING {
            let args = MixArgs {
                video_url: string_param(params, "video_url")?,
                audio_url: string_param(params, "audio_url")?,
            };
            return self
                .ffmpeg_present(endpoint)
                .await
                .then_some(LocalClaim::Mix(args));
        }

        if endpoint.contains("thumbnail") || endpoint.contains("screenshot") {
            let subject = SUBJECT_KEYS.iter().find_map(|key| string_param(params, key))?;
            if is_video_reference(&subject) {
                return Some(LocalClaim::Thumbnail(ThumbnailArgs {
                    video_url: subject,
                    time_offset: offset_param(params),
                }));
            }
            if is_http_url(&subject) && !is_audio_reference(&subject) {
                return Some(LocalClaim::Screenshot(ScreenshotArgs {
                    url: subject,
                    viewport_width: u32_param(params, "viewport_width"),
                    viewport_height: u32_param(params, "viewport_height"),
                }));
            }
        }

        None
    }

    /// Run a claimed operation.
    pub async fn execute(&self, claim: &LocalClaim) -> Result<Value, LocalTaskError> {
        let output = match claim {
            LocalClaim::Concat(args) => self.executor.concat_audio(args).await,
            LocalClaim::Mix(args) => self.executor.mix_audio_video(args).await,
            LocalClaim::Thumbnail(args) => self.executor.thumbnail(args).await,
            LocalClaim::Screenshot(args) => self.executor.screenshot(args).await,
        }?;
        Ok(output.into_value())
    }

    async fn ffmpeg_present(&self, endpoint: &str) -> bool {
        let available = self.executor.tools().ffmpeg_available().await;
        if !available {
            tracing::info!(endpoint, "ffmpeg unavailable, leaving operation to the remote backend");
        }
        available
    }
}

fn string_param(params: &Params, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn u32_param(params: &Params, key: &str) -> Option<u32> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn offset_param(params: &Params) -> Option<String> {
    match params.get("time_offset")? {
        Value::Number(n) => Some(n.to_string()),
        value => value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
    }
}

fn audio_list(params: &Params) -> Option<ConcatArgs> {
    let items = params
        .get("audio_urls")
        .or_else(|| params.get("audio_files"))?
        .as_array()?;
    let audio_urls = items
        .iter()
        .map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("audio_url").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    (!audio_urls.is_empty()).then_some(ConcatArgs { audio_urls })
}
