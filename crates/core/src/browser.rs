//! Headless-browser page capture.
//!
//! Drives a Chromium-compatible binary in headless mode with `--screenshot`.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::media::is_http_url;
use crate::subprocess::{self, SubprocessError};

pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Largest accepted viewport edge in pixels.
pub const MAX_VIEWPORT_EDGE: u32 = 8192;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("browser binary not found: {0}")]
    NotFound(String),

    #[error("browser failed (exit code {exit_code}): {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    #[error("browser timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("not an http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("invalid viewport {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("browser produced no screenshot at {0}")]
    NoOutput(String),

    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl From<SubprocessError> for BrowserError {
    fn from(err: SubprocessError) -> Self {
        match err {
            SubprocessError::NotFound { program, .. } => Self::NotFound(program),
            SubprocessError::Timeout { elapsed_ms, .. } => Self::Timeout { elapsed_ms },
            SubprocessError::Io { source, .. } => Self::Io(source),
        }
    }
}

/// Viewport size of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl Viewport {
    fn validate(self) -> Result<Self, BrowserError> {
        let ok = |edge: u32| (1..=MAX_VIEWPORT_EDGE).contains(&edge);
        if ok(self.width) && ok(self.height) {
            Ok(self)
        } else {
            Err(BrowserError::InvalidViewport {
                width: self.width,
                height: self.height,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessBrowser {
    binary: String,
    timeout: Duration,
}

impl HeadlessBrowser {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Render `url` and write a PNG capture to `output`.
    pub async fn screenshot(
        &self,
        url: &str,
        viewport: Viewport,
        output: &Path,
    ) -> Result<(), BrowserError> {
        if !is_http_url(url) {
            return Err(BrowserError::InvalidUrl(url.to_string()));
        }
        let viewport = viewport.validate()?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(screenshot_args(url, viewport, output));
        tracing::debug!(binary = %self.binary, url, "Capturing page");

        let result = subprocess::run_command(&mut cmd, self.timeout).await?;
        if !result.success() {
            return Err(BrowserError::ExecutionFailed {
                exit_code: result.exit_code,
                stderr: result.stderr_tail(),
            });
        }
        if !output.is_file() {
            return Err(BrowserError::NoOutput(output.display().to_string()));
        }
        Ok(())
    }
}

pub fn screenshot_args(url: &str, viewport: Viewport, output: &Path) -> Vec<OsString> {
    let mut screenshot_flag = OsString::from("--screenshot=");
    screenshot_flag.push(output.as_os_str());

    vec![
        "--headless".into(),
        "--disable-gpu".into(),
        "--no-sandbox".into(),
        "--disable-dev-shm-usage".into(),
        "--hide-scrollbars".into(),
        format!("--window-size={},{}", viewport.width, viewport.height).into(),
        screenshot_flag,
        url.into(),
    ]
}
