#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mediaflow_api::config::ServerConfig;
use mediaflow_api::router::build_app_router;
use mediaflow_api::state::{AppState, Collaborators};
use mediaflow_core::browser::{BrowserError, Viewport};
use mediaflow_core::downloader::DownloadError;
use mediaflow_core::ffmpeg::FfmpegError;
use mediaflow_core::scenario::ScenarioMap;
use mediaflow_pipeline::fetch::MediaFetcher;
use mediaflow_pipeline::tools::MediaTools;
use mediaflow_pipeline::ScenarioRegistry;
use mediaflow_toolkit::{RemoteTransport, TransportError, TransportResponse};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BASE_URL: &str = "http://localhost:5000";
pub const BOUNDARY: &str = "mediaflow-test-boundary";

/// Build a test `ServerConfig` rooted in `dir`.
pub fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "sqlite::memory:".to_string(),
        upload_dir: dir.join("uploads"),
        public_base_url: BASE_URL.to_string(),
        max_upload_bytes: 1024,
        toolkit_api_url: "http://toolkit.invalid".to_string(),
        toolkit_api_key: String::new(),
        toolkit_timeout_secs: 5,
        toolkit_max_retries: 1,
        gemini_api_url: "http://gemini.invalid".to_string(),
        gemini_api_key: None,
        gemini_model: "test".to_string(),
        ffmpeg_bin: "ffmpeg".to_string(),
        browser_bin: "chromium".to_string(),
        ytdlp_bin: "yt-dlp".to_string(),
        local_tool_timeout_secs: 5,
        scenarios_path: dir.join("scenarios.json"),
        job_list_limit: 10,
    }
}

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

/// Remote backend that answers every call with the same JSON body.
pub struct EchoTransport {
    pub calls: Mutex<Vec<String>>,
    body: Value,
}

#[async_trait]
impl RemoteTransport for EchoTransport {
    async fn post_json(
        &self,
        endpoint: &str,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(format!("POST {endpoint}"));
        Ok(TransportResponse {
            status: 200,
            body: self.body.clone(),
        })
    }

    async fn get_json(
        &self,
        endpoint: &str,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(format!("GET {endpoint}"));
        Ok(TransportResponse {
            status: 200,
            body: self.body.clone(),
        })
    }
}

/// Joins input bytes instead of transcoding.
pub struct ByteTools;

#[async_trait]
impl MediaTools for ByteTools {
    async fn ffmpeg_available(&self) -> bool {
        true
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError> {
        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(std::fs::read(input)?);
        }
        std::fs::write(output, joined)?;
        Ok(())
    }

    async fn mix_audio_video(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), FfmpegError> {
        let mut joined = std::fs::read(video)?;
        joined.extend(std::fs::read(audio)?);
        std::fs::write(output, joined)?;
        Ok(())
    }

    async fn extract_frame(&self, _video: &Path, _offset: &str, output: &Path) -> Result<(), FfmpegError> {
        std::fs::write(output, b"frame")?;
        Ok(())
    }

    async fn image_to_video(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), FfmpegError> {
        self.mix_audio_video(image, audio, output).await
    }

    async fn screenshot(&self, _url: &str, _viewport: Viewport, output: &Path) -> Result<(), BrowserError> {
        std::fs::write(output, b"png").map_err(BrowserError::Io)
    }
}

pub struct NoFetch;

#[async_trait]
impl MediaFetcher for NoFetch {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
        Err(DownloadError::MissingOutput(url.to_string()))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub transport: Arc<EchoTransport>,
    pub dir: TempDir,
}

/// Full application over an in-memory database with the given remote reply.
pub async fn build_test_app(remote_reply: Value) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.upload_dir).unwrap();

    let pool = mediaflow_db::create_pool(&config.database_url).await.unwrap();
    mediaflow_db::run_migrations(&pool).await.unwrap();

    let scenarios = Arc::new(ScenarioRegistry::new(
        config.scenarios_path.clone(),
        ScenarioMap::new(),
    ));
    let transport = Arc::new(EchoTransport {
        calls: Mutex::new(Vec::new()),
        body: remote_reply,
    });
    let collaborators = Collaborators {
        transport: transport.clone(),
        tools: Arc::new(ByteTools),
        fetcher: Arc::new(NoFetch),
        text: None,
    };

    let state = AppState::new(pool, config, scenarios, collaborators);
    TestApp {
        router: build_app_router(state.clone()),
        state,
        transport,
        dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: Value) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// `POST /api/process` as multipart with a message and `(name, bytes)` files.
    pub async fn post_multipart<B: AsRef<[u8]>>(&self, message: &str, files: &[(&str, B)]) -> Response<Body> {
        let request = Request::post("/api/process")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(message, files)))
            .unwrap();
        self.send(request).await
    }

    /// Poll a job until it is completed or failed.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        for _ in 0..200 {
            let response = self.get(&format!("/api/jobs/{job_id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let job = body_json(response).await["data"].clone();
            if job["status"] == "completed" || job["status"] == "failed" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }
}

pub fn multipart_body<B: AsRef<[u8]>>(message: &str, files: &[(&str, B)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\n{message}\r\n"
        )
        .into_bytes(),
    );
    for (name, bytes) in files {
        body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .into_bytes(),
        );
        body.extend_from_slice(bytes.as_ref());
        body.extend_from_slice(b"\r\n");
    }
    body.extend(format!("--{BOUNDARY}--\r\n").into_bytes());
    body
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(null))
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}
