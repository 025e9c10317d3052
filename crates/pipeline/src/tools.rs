//! Seam over the out-of-process media tools used by local executors.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mediaflow_core::browser::{BrowserError, HeadlessBrowser, Viewport};
use mediaflow_core::ffmpeg::{Ffmpeg, FfmpegError};

/// Media operations the local override router may run on this host.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Presence probe for the media tool. Local audio overrides are only
    /// claimed when this returns `true`.
    async fn ffmpeg_available(&self) -> bool;

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError>;

    async fn mix_audio_video(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError>;

    /// Grab one frame at `offset` (seconds or `HH:MM:SS`).
    async fn extract_frame(&self, video: &Path, offset: &str, output: &Path) -> Result<(), FfmpegError>;

    async fn image_to_video(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError>;

    async fn screenshot(&self, url: &str, viewport: Viewport, output: &Path)
        -> Result<(), BrowserError>;
}

/// Production tools: `ffmpeg` and a headless Chromium.
pub struct SystemMediaTools {
    ffmpeg: Ffmpeg,
    browser: HeadlessBrowser,
}

impl SystemMediaTools {
    pub fn new(ffmpeg: Ffmpeg, browser: HeadlessBrowser) -> Self {
        Self { ffmpeg, browser }
    }
}

#[async_trait]
impl MediaTools for SystemMediaTools {
    async fn ffmpeg_available(&self) -> bool {
        let available = self.ffmpeg.is_available().await;
        if !available {
            tracing::debug!(binary = %self.ffmpeg.binary(), "ffmpeg not available");
        }
        available
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError> {
        self.ffmpeg.concat_audio(inputs, output).await
    }

    async fn mix_audio_video(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        self.ffmpeg.mix_audio_video(video, audio, output).await
    }

    async fn extract_frame(&self, video: &Path, offset: &str, output: &Path) -> Result<(), FfmpegError> {
        self.ffmpeg.extract_frame(video, output, offset).await
    }

    async fn image_to_video(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        self.ffmpeg.image_to_video(image, audio, output).await
    }

    async fn screenshot(
        &self,
        url: &str,
        viewport: Viewport,
        output: &Path,
    ) -> Result<(), BrowserError> {
        self.browser.screenshot(url, viewport, output).await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    /// Writes deterministic bytes instead of running real tools. Concat
    /// output is the input files joined in order. A failing instance
    /// exits non-zero on frame grabs and page captures.
    pub struct FakeTools {
        pub available: bool,
        pub failing: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeTools {
        pub fn new(available: bool) -> Self {
            Self {
                available,
                failing: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::new(true)
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl MediaTools for FakeTools {
        async fn ffmpeg_available(&self) -> bool {
            self.available
        }

        async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError> {
            self.record("concat");
            let mut joined = Vec::new();
            for input in inputs {
                joined.extend(std::fs::read(input)?);
            }
            std::fs::write(output, joined)?;
            Ok(())
        }

        async fn mix_audio_video(
            &self,
            video: &Path,
            audio: &Path,
            output: &Path,
        ) -> Result<(), FfmpegError> {
            self.record("mix");
            let mut joined = std::fs::read(video)?;
            joined.extend(std::fs::read(audio)?);
            std::fs::write(output, joined)?;
            Ok(())
        }

        async fn extract_frame(&self, _video: &Path, offset: &str, output: &Path) -> Result<(), FfmpegError> {
            self.record(&format!("frame {offset}"));
            if self.failing {
                return Err(FfmpegError::ExecutionFailed {
                    exit_code: 1,
                    stderr: "invalid data found".into(),
                });
            }
            std::fs::write(output, b"frame")?;
            Ok(())
        }

        async fn image_to_video(
            &self,
            _image: &Path,
            _audio: &Path,
            output: &Path,
        ) -> Result<(), FfmpegError> {
            self.record("image_to_video");
            std::fs::write(output, b"video")?;
            Ok(())
        }

        async fn screenshot(
            &self,
            url: &str,
            viewport: Viewport,
            output: &Path,
        ) -> Result<(), BrowserError> {
            self.record(&format!("screenshot {url} {}x{}", viewport.width, viewport.height));
            if self.failing {
                return Err(BrowserError::ExecutionFailed {
                    exit_code: 1,
                    stderr: "page crashed".into(),
                });
            }
            std::fs::write(output, b"png").map_err(BrowserError::Io)?;
            Ok(())
        }
    }
}
