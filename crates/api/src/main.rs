use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mediaflow_core::media::MediaPaths;
use mediaflow_pipeline::ScenarioRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediaflow_api::config::ServerConfig;
use mediaflow_api::router::build_app_router;
use mediaflow_api::state::{AppState, Collaborators};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mediaflow_api=debug,mediaflow_pipeline=debug,mediaflow_toolkit=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage directories ---
    if let Some(dir) = sqlite_parent_dir(&config.database_url) {
        std::fs::create_dir_all(&dir).expect("Failed to create database directory");
    }
    std::fs::create_dir_all(&config.upload_dir).expect("Failed to create upload directory");

    // --- Database ---
    let pool = mediaflow_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    mediaflow_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    mediaflow_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Scenarios ---
    let scenarios = Arc::new(
        ScenarioRegistry::load(config.scenarios_path.clone())
            .await
            .expect("Failed to load scenario file"),
    );

    // --- App state ---
    let paths = MediaPaths::new(config.upload_dir.clone(), config.public_base_url.clone());
    let collaborators = Collaborators::from_config(&config, &paths);
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );

    let state = AppState::new(pool, config, scenarios, collaborators);
    let runner = Arc::clone(&state.runner);
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Drain running jobs ---
    let tracker = runner.tracker();
    tracker.close();
    tracing::info!(running = tracker.len(), "Server stopped accepting connections, waiting for jobs");
    if tokio::time::timeout(shutdown_timeout, tracker.wait()).await.is_err() {
        tracing::warn!(
            running = tracker.len(),
            "Shutdown timeout elapsed with jobs still running"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Directory of a file-backed SQLite URL such as `sqlite://data/app.db?mode=rwc`.
fn sqlite_parent_dir(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let file = rest.split('?').next().unwrap_or_default();
    if file.is_empty() || file.contains(":memory:") {
        return None;
    }
    Path::new(file)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
