//! Pre-fetching of video-sharing URLs into local storage.

use async_trait::async_trait;
use mediaflow_core::downloader::{DownloadError, VideoDownloader};
use mediaflow_core::media::{is_youtube_url, MediaPaths};
use serde_json::Value;

/// Downloads a remote video and returns the public URL of the local copy.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError>;
}

/// `yt-dlp` into the upload directory.
pub struct YtDlpFetcher {
    downloader: VideoDownloader,
    paths: MediaPaths,
}

impl YtDlpFetcher {
    pub fn new(downloader: VideoDownloader, paths: MediaPaths) -> Self {
        Self { downloader, paths }
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
        let media = self.downloader.download(url, self.paths.upload_dir()).await?;
        Ok(self.paths.url_for(&media.stored_filename))
    }
}

/// Distinct video-sharing URLs among the string values of `value`, in
/// first-seen order.
pub fn video_share_urls(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect(value, &mut found);
    found
}

fn collect(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::String(s) if is_youtube_url(s) => {
            let url = s.trim().to_string();
            if !found.contains(&url) {
                found.push(url);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect(v, found)),
        _ => {}
    }
}

/// Replace every string equal to `from` (after trimming) with `to`.
pub fn replace_url(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::String(s) if s.trim() == from => *s = to.to_string(),
        Value::Array(items) => items.iter_mut().for_each(|v| replace_url(v, from, to)),
        Value::Object(map) => map.values_mut().for_each(|v| replace_url(v, from, to)),
        _ => {}
    }
}
