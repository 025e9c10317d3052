use axum::extract::State;
use axum::{routing::get, Json, Router};
use mediaflow_toolkit::RemoteHealth;
use serde::Serialize;

use crate::state::{AppState, HEALTH_PROBE_TIMEOUT};

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the database answers, `degraded` otherwise.
    pub status: &'static str,
    pub service: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    /// Reachability of the remote processing backend.
    pub toolkit: RemoteHealth,
}

/// GET /health -- service, database and remote backend health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = mediaflow_db::health_check(&state.pool).await.is_ok();
    let toolkit = state.toolkit.health(HEALTH_PROBE_TIMEOUT).await;

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        toolkit,
    })
}

/// Mount health check routes (root level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
