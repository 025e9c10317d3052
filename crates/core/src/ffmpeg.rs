//! FFmpeg command builders and runner for the local media executors.
//!
//! Argument lists are built by pure functions so they can be checked
//! without an ffmpeg binary; [`Ffmpeg`] runs them through the shared
//! subprocess runner.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::subprocess::{self, SubprocessError};

/// Offset of the frame grabbed for video thumbnails.
pub const DEFAULT_THUMBNAIL_OFFSET: &str = "00:00:01";

/// Timeout of the `-version` presence probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found: {0}")]
    NotFound(String),

    #[error("ffmpeg execution failed (exit code {exit_code}): {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    #[error("ffmpeg timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("input file not found: {0}")]
    InputNotFound(String),

    #[error("at least {required} inputs required, got {actual}")]
    NotEnoughInputs { required: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SubprocessError> for FfmpegError {
    fn from(err: SubprocessError) -> Self {
        match err {
            SubprocessError::NotFound { program, .. } => Self::NotFound(program),
            SubprocessError::Timeout { elapsed_ms, .. } => Self::Timeout { elapsed_ms },
            SubprocessError::Io { source, .. } => Self::Io(source),
        }
    }
}

/// Handle to a configured ffmpeg binary.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: String,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Cheap presence probe: `ffmpeg -version` must start and exit 0.
    pub async fn is_available(&self) -> bool {
        subprocess::probe(&self.binary, &["-version"], PROBE_TIMEOUT).await
    }

    /// Join audio files in order into `output`, re-encoding through the
    /// concat filter so mixed formats are accepted. A single input is
    /// re-encoded as is.
    pub async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError> {
        if inputs.is_empty() {
            return Err(FfmpegError::NotEnoughInputs {
                required: 1,
                actual: inputs.len(),
            });
        }
        ensure_inputs(inputs.iter().map(PathBuf::as_path))?;
        self.run(concat_audio_args(inputs, output)).await
    }

    /// Mux `audio` onto `video`: video stream copied, audio re-encoded to
    /// AAC, duration cut to the shorter stream.
    pub async fn mix_audio_video(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        ensure_inputs([video, audio])?;
        self.run(mix_args(video, audio, output)).await
    }

    /// Grab one frame of `video` at `offset` (`HH:MM:SS` or seconds).
    pub async fn extract_frame(
        &self,
        video: &Path,
        output: &Path,
        offset: &str,
    ) -> Result<(), FfmpegError> {
        ensure_inputs([video])?;
        self.run(frame_args(video, output, offset)).await
    }

    /// Loop a still image over an audio track into an H.264 video.
    pub async fn image_to_video(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        ensure_inputs([image, audio])?;
        self.run(image_to_video_args(image, audio, output)).await
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), FfmpegError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args);
        tracing::debug!(binary = %self.binary, args = ?args, "Running ffmpeg");

        let output = subprocess::run_command(&mut cmd, self.timeout).await?;
        if !output.success() {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: output.exit_code,
                stderr: output.stderr_tail(),
            });
        }
        Ok(())
    }
}

fn ensure_inputs<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<(), FfmpegError> {
    for path in paths {
        if !path.is_file() {
            return Err(FfmpegError::InputNotFound(path.display().to_string()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Argument builders
// ---------------------------------------------------------------------------

/// `ffmpeg -y -i a -i b ... -filter_complex "[0:a][1:a]...concat=n=N:v=0:a=1[out]" -map [out] out`
pub fn concat_audio_args(inputs: &[PathBuf], output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
    }
    let streams: String = (0..inputs.len()).map(|i| format!("[{i}:a]")).collect();
    args.push("-filter_complex".into());
    args.push(format!("{streams}concat=n={}:v=0:a=1[out]", inputs.len()).into());
    args.push("-map".into());
    args.push("[out]".into());
    args.push(output.as_os_str().to_owned());
    args
}

pub fn mix_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), video.into(), "-i".into(), audio.into()];
    args.extend(
        ["-c:v", "copy", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0", "-shortest"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

pub fn frame_args(video: &Path, output: &Path, offset: &str) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.into(),
        "-ss".into(),
        offset.into(),
        "-vframes".into(),
        "1".into(),
        output.into(),
    ]
}

pub fn image_to_video_args(image: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.into(),
        "-i".into(),
        audio.into(),
    ];
    args.extend(
        [
            "-c:v", "libx264", "-tune", "stillimage", "-c:a", "aac", "-b:a", "192k", "-pix_fmt",
            "yuv420p", "-shortest",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.into());
    args
}
