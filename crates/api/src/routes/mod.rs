pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{catalog, history, jobs, process, scenarios};
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /process                        submit a message with optional uploads (POST)
/// /jobs                           list recent jobs
/// /jobs/{id}                      poll one job
/// /scenarios                      list, replace (GET, PUT)
/// /scenarios/{id}/execute         start a scenario job (POST)
/// /history                        conversations with messages
/// /endpoints                      operation catalog
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Per-file size is enforced while streaming uploads.
        .route(
            "/process",
            post(process::submit).layer(DefaultBodyLimit::disable()),
        )
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route(
            "/scenarios",
            get(scenarios::list_scenarios).put(scenarios::replace_scenarios),
        )
        .route("/scenarios/{id}/execute", post(scenarios::execute_scenario))
        .route("/history", get(history::list_history))
        .route("/endpoints", get(catalog::list_endpoints))
}
