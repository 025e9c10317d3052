//! Remote video fetching through `yt-dlp`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::media::is_youtube_url;
use crate::subprocess::{self, SubprocessError};

/// Format selector preferring a single mp4 file.
const FORMAT_SELECTOR: &str = "b[ext=mp4]/bv*[ext=mp4]+ba[ext=m4a]/b";

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("downloader binary not found: {0}")]
    NotFound(String),

    #[error("download failed (exit code {exit_code}): {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    #[error("download timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("unsupported video URL: {0}")]
    UnsupportedUrl(String),

    #[error("downloaded file not found for {0}")]
    MissingOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SubprocessError> for DownloadError {
    fn from(err: SubprocessError) -> Self {
        match err {
            SubprocessError::NotFound { program, .. } => Self::NotFound(program),
            SubprocessError::Timeout { elapsed_ms, .. } => Self::Timeout { elapsed_ms },
            SubprocessError::Io { source, .. } => Self::Io(source),
        }
    }
}

/// A file fetched into the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    pub stored_filename: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct VideoDownloader {
    binary: String,
    timeout: Duration,
}

impl VideoDownloader {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Download `url` into `dest_dir` under a fresh `<uuid>.<ext>` name.
    pub async fn download(&self, url: &str, dest_dir: &Path) -> Result<DownloadedMedia, DownloadError> {
        if !is_youtube_url(url) {
            return Err(DownloadError::UnsupportedUrl(url.to_string()));
        }
        tokio::fs::create_dir_all(dest_dir).await?;

        let stem = uuid::Uuid::new_v4().to_string();
        let template = dest_dir.join(format!("{stem}.%(ext)s"));

        let mut cmd = Command::new(&self.binary);
        cmd.args(["--no-playlist", "-f", FORMAT_SELECTOR, "--merge-output-format", "mp4", "-o"])
            .arg(&template)
            .arg(url);

        tracing::info!(url, binary = %self.binary, "Downloading remote video");
        let output = subprocess::run_command(&mut cmd, self.timeout).await?;
        if !output.success() {
            return Err(DownloadError::ExecutionFailed {
                exit_code: output.exit_code,
                stderr: output.stderr_tail(),
            });
        }

        let (stored_filename, path) = find_output(dest_dir, &stem)
            .await?
            .ok_or_else(|| DownloadError::MissingOutput(url.to_string()))?;
        let size = tokio::fs::metadata(&path).await?.len();

        tracing::info!(url, stored_filename = %stored_filename, size, "Remote video downloaded");
        Ok(DownloadedMedia {
            stored_filename,
            path,
            size,
        })
    }
}

/// Locate `<stem>.<ext>` in `dir`, skipping yt-dlp partial files.
async fn find_output(dir: &Path, stem: &str) -> Result<Option<(String, PathBuf)>, std::io::Error> {
    let prefix = format!("{stem}.");
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            return Ok(Some((name, entry.path())));
        }
    }
    Ok(None)
}
