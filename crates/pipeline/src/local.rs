//! Local executors: media operations run on this host instead of the
//! remote backend.
//!
//! Every executor writes its output into the upload directory under a
//! `<kind>_<8 hex>.<ext>` name and returns a result shaped like
//! `{url, type, size, source: "local", filename, stored_filename}`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediaflow_core::browser::Viewport;
use mediaflow_core::ffmpeg::DEFAULT_THUMBNAIL_OFFSET;
use mediaflow_core::media::{short_id, MediaPaths};
use mediaflow_core::scenario::LocalFunction;
use mediaflow_core::uploads::FileClass;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::LocalTaskError;
use crate::tools::MediaTools;

/// Marker in `source` of every locally produced result.
pub const LOCAL_SOURCE: &str = "local";

/// Result of one local execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalOutput {
    pub url: String,
    #[serde(rename = "type")]
    pub file_type: FileClass,
    pub size: u64,
    pub source: &'static str,
    pub filename: String,
    pub stored_filename: String,
}

impl LocalOutput {
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ConcatArgs {
    #[serde(alias = "audio_files")]
    pub audio_urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MixArgs {
    pub video_url: String,
    pub audio_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailArgs {
    #[serde(alias = "media_url", alias = "url")]
    pub video_url: String,
    /// Seconds or `HH:MM:SS`; defaults to one second in.
    #[serde(default, deserialize_with = "lenient_offset")]
    pub time_offset: Option<String>,
}

impl ThumbnailArgs {
    pub fn offset(&self) -> &str {
        self.time_offset.as_deref().unwrap_or(DEFAULT_THUMBNAIL_OFFSET)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotArgs {
    pub url: String,
    #[serde(default, alias = "width", deserialize_with = "lenient_u32")]
    pub viewport_width: Option<u32>,
    #[serde(default, alias = "height", deserialize_with = "lenient_u32")]
    pub viewport_height: Option<u32>,
}

impl ScreenshotArgs {
    pub fn viewport(&self) -> Viewport {
        let default = Viewport::default();
        Viewport {
            width: self.viewport_width.unwrap_or(default.width),
            height: self.viewport_height.unwrap_or(default.height),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageToVideoArgs {
    pub image_url: String,
    pub audio_url: String,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct LocalExecutor {
    tools: Arc<dyn MediaTools>,
    paths: MediaPaths,
}

impl LocalExecutor {
    pub fn new(tools: Arc<dyn MediaTools>, paths: MediaPaths) -> Self {
        Self { tools, paths }
    }

    pub fn tools(&self) -> &Arc<dyn MediaTools> {
        &self.tools
    }

    pub fn paths(&self) -> &MediaPaths {
        &self.paths
    }

    /// Join audio files in the given order into one MP3.
    pub async fn concat_audio(&self, args: &ConcatArgs) -> Result<LocalOutput, LocalTaskError> {
        let inputs = args
            .audio_urls
            .iter()
            .map(|url| self.paths.resolve_local(url))
            .collect::<Result<Vec<PathBuf>, _>>()?;

        let (name, output) = self.output_path("concat", "mp3").await?;
        tracing::info!(inputs = inputs.len(), output = %name, "Concatenating audio locally");
        self.tools
            .concat_audio(&inputs, &output)
            .await
            .map_err(LocalTaskError::Concat)?;
        self.finish(name, &output, FileClass::Audio).await
    }

    /// Lay an audio track over a video; the shorter stream sets the length.
    pub async fn mix_audio_video(&self, args: &MixArgs) -> Result<LocalOutput, LocalTaskError> {
        let video = self.paths.resolve_local(&args.video_url)?;
        let audio = self.paths.resolve_local(&args.audio_url)?;

        let (name, output) = self.output_path("mixed", "mp4").await?;
        tracing::info!(output = %name, "Mixing audio and video locally");
        self.tools
            .mix_audio_video(&video, &audio, &output)
            .await
            .map_err(LocalTaskError::Mix)?;
        self.finish(name, &output, FileClass::Video).await
    }

    /// Extract a still frame from an uploaded video.
    pub async fn thumbnail(&self, args: &ThumbnailArgs) -> Result<LocalOutput, LocalTaskError> {
        let video = self.paths.resolve_local(&args.video_url)?;

        let (name, output) = self.output_path("thumbnail", "jpg").await?;
        tracing::info!(output = %name, "Extracting thumbnail locally");
        self.tools
            .extract_frame(&video, args.offset(), &output)
            .await
            .map_err(LocalTaskError::Thumbnail)?;
        self.finish(name, &output, FileClass::Image).await
    }

    /// Render a web page in the headless browser.
    pub async fn screenshot(&self, args: &ScreenshotArgs) -> Result<LocalOutput, LocalTaskError> {
        let viewport = args.viewport();

        let (name, output) = self.output_path("screenshot", "png").await?;
        tracing::info!(
            url = %args.url,
            width = viewport.width,
            height = viewport.height,
            output = %name,
            "Capturing website screenshot"
        );
        self.tools
            .screenshot(&args.url, viewport, &output)
            .await
            .map_err(LocalTaskError::Screenshot)?;
        self.finish(name, &output, FileClass::Image).await
    }

    /// Loop a still image over an audio track.
    pub async fn image_to_video(
        &self,
        args: &ImageToVideoArgs,
    ) -> Result<LocalOutput, LocalTaskError> {
        let image = self.paths.resolve_local(&args.image_url)?;
        let audio = self.paths.resolve_local(&args.audio_url)?;

        let (name, output) = self.output_path("recap", "mp4").await?;
        tracing::info!(output = %name, "Creating video from image and audio");
        self.tools
            .image_to_video(&image, &audio, &output)
            .await
            .map_err(LocalTaskError::ImageToVideo)?;
        self.finish(name, &output, FileClass::Video).await
    }

    /// Run a scenario `local_task` function with its resolved parameters.
    pub async fn run_function(
        &self,
        function: LocalFunction,
        params: Value,
    ) -> Result<Value, LocalTaskError> {
        let output = match function {
            LocalFunction::LocalAudioConcat => self.concat_audio(&parse_args(function, params)?).await,
            LocalFunction::LocalAudioMixing => {
                self.mix_audio_video(&parse_args(function, params)?).await
            }
            LocalFunction::CreateThumbnail => self.thumbnail(&parse_args(function, params)?).await,
            LocalFunction::CreateWebsiteScreenshot => {
                self.screenshot(&parse_args(function, params)?).await
            }
            LocalFunction::CreateVideoFromImageAndAudio => {
                self.image_to_video(&parse_args(function, params)?).await
            }
        }?;
        Ok(output.into_value())
    }

    async fn output_path(&self, kind: &str, ext: &str) -> Result<(String, PathBuf), LocalTaskError> {
        tokio::fs::create_dir_all(self.paths.upload_dir()).await?;
        let name = format!("{kind}_{}.{ext}", short_id());
        let path = self.paths.path_for(&name);
        Ok((name, path))
    }

    async fn finish(
        &self,
        name: String,
        output: &Path,
        file_type: FileClass,
    ) -> Result<LocalOutput, LocalTaskError> {
        let size = tokio::fs::metadata(output).await?.len();
        tracing::info!(output = %name, size, "Local output written");
        Ok(LocalOutput {
            url: self.paths.url_for(&name),
            file_type,
            size,
            source: LOCAL_SOURCE,
            filename: name.clone(),
            stored_filename: name,
        })
    }
}

/// Number or numeric string; anything else counts as absent.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_offset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn parse_args<T: DeserializeOwned>(function: LocalFunction, params: Value) -> Result<T, LocalTaskError> {
    serde_json::from_value(params).map_err(|e| LocalTaskError::invalid(function.as_str(), e.to_string()))
}
