use std::path::PathBuf;
use std::time::Duration;

use mediaflow_core::uploads::DEFAULT_MAX_UPLOAD_BYTES;
use mediaflow_pipeline::text_gen::{DEFAULT_GEMINI_API_URL, DEFAULT_GEMINI_MODEL};
use mediaflow_toolkit::ToolkitConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    /// Directory holding uploads and locally produced outputs.
    pub upload_dir: PathBuf,
    /// Base of generated `/uploads/<name>` URLs.
    pub public_base_url: String,
    /// Per-file upload limit in bytes.
    pub max_upload_bytes: u64,
    pub toolkit_api_url: String,
    /// Sent as `x-api-key`; may be empty.
    pub toolkit_api_key: String,
    pub toolkit_timeout_secs: u64,
    pub toolkit_max_retries: u32,
    pub gemini_api_url: String,
    /// `None` disables model-based intent extraction and text steps.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ffmpeg_bin: String,
    pub browser_bin: String,
    pub ytdlp_bin: String,
    /// Hard limit for any local subprocess.
    pub local_tool_timeout_secs: u64,
    pub scenarios_path: PathBuf,
    /// Upper bound on jobs returned by a listing.
    pub job_list_limit: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                 |
    /// |---------------------------|-----------------------------------------|
    /// | `HOST`                    | `0.0.0.0`                               |
    /// | `PORT`                    | `5000`                                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`                 |
    /// | `REQUEST_TIMEOUT_SECS`    | `60`                                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                                    |
    /// | `DATABASE_URL`            | `sqlite://data/mediaflow.db?mode=rwc`   |
    /// | `UPLOAD_DIR`              | `uploads`                               |
    /// | `PUBLIC_BASE_URL`         | `http://localhost:5000`                 |
    /// | `MAX_UPLOAD_BYTES`        | `524288000`                             |
    /// | `TOOLKIT_API_URL`         | `http://localhost:8080`                 |
    /// | `TOOLKIT_API_KEY`         | empty                                   |
    /// | `TOOLKIT_TIMEOUT_SECS`    | `600`                                   |
    /// | `TOOLKIT_MAX_RETRIES`     | `3`                                     |
    /// | `GEMINI_API_URL`          | `https://generativelanguage.googleapis.com` |
    /// | `GEMINI_API_KEY`          | unset                                   |
    /// | `GEMINI_MODEL`            | `gemini-2.0-flash`                      |
    /// | `FFMPEG_BIN`              | `ffmpeg`                                |
    /// | `BROWSER_BIN`             | `chromium`                              |
    /// | `YTDLP_BIN`               | `yt-dlp`                                |
    /// | `LOCAL_TOOL_TIMEOUT_SECS` | `600`                                   |
    /// | `SCENARIOS_PATH`          | `scenarios.json`                        |
    /// | `JOB_LIST_LIMIT`          | `100`                                   |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");

        let port: u16 = env_or("PORT", "5000")
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "60")
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", "30")
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: u64 = std::env::var("MAX_UPLOAD_BYTES")
            .map(|v| v.parse().expect("MAX_UPLOAD_BYTES must be a valid u64"))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let toolkit_timeout_secs: u64 = env_or("TOOLKIT_TIMEOUT_SECS", "600")
            .parse()
            .expect("TOOLKIT_TIMEOUT_SECS must be a valid u64");

        let toolkit_max_retries: u32 = env_or("TOOLKIT_MAX_RETRIES", "3")
            .parse()
            .expect("TOOLKIT_MAX_RETRIES must be a valid u32");

        let local_tool_timeout_secs: u64 = env_or("LOCAL_TOOL_TIMEOUT_SECS", "600")
            .parse()
            .expect("LOCAL_TOOL_TIMEOUT_SECS must be a valid u64");

        let job_list_limit: i64 = env_or("JOB_LIST_LIMIT", "100")
            .parse()
            .expect("JOB_LIST_LIMIT must be a valid i64");

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url: env_or("DATABASE_URL", "sqlite://data/mediaflow.db?mode=rwc"),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:5000"),
            max_upload_bytes,
            toolkit_api_url: env_or("TOOLKIT_API_URL", "http://localhost:8080"),
            toolkit_api_key: env_or("TOOLKIT_API_KEY", ""),
            toolkit_timeout_secs,
            toolkit_max_retries,
            gemini_api_url: env_or("GEMINI_API_URL", DEFAULT_GEMINI_API_URL),
            gemini_api_key,
            gemini_model: env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg"),
            browser_bin: env_or("BROWSER_BIN", "chromium"),
            ytdlp_bin: env_or("YTDLP_BIN", "yt-dlp"),
            local_tool_timeout_secs,
            scenarios_path: PathBuf::from(env_or("SCENARIOS_PATH", "scenarios.json")),
            job_list_limit,
        }
    }

    /// Retry and timeout settings for the remote backend client.
    pub fn toolkit(&self) -> ToolkitConfig {
        ToolkitConfig {
            timeout: Duration::from_secs(self.toolkit_timeout_secs),
            max_retries: self.toolkit_max_retries.max(1),
            ..ToolkitConfig::default()
        }
    }

    pub fn local_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.local_tool_timeout_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}
