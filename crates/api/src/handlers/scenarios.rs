//! Handlers for the `/scenarios` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mediaflow_core::error::CoreError;
use mediaflow_core::scenario::{ScenarioError, ScenarioMap};
use mediaflow_core::types::{EntityId, Params};
use mediaflow_db::models::job::CreateJob;
use mediaflow_db::models::status::MessageRole;
use mediaflow_db::repositories::ConversationRepo;
use mediaflow_pipeline::JobKind;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /api/scenarios/{id}/execute`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteScenario {
    #[serde(default)]
    pub inputs: Params,
    #[serde(default)]
    pub conversation_id: Option<EntityId>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioAccepted {
    pub job_id: EntityId,
    pub conversation_id: EntityId,
}

/// GET /api/scenarios
pub async fn list_scenarios(State(state): State<AppState>) -> Json<DataResponse<ScenarioMap>> {
    Json(DataResponse {
        data: state.scenarios.list().await,
    })
}

/// PUT /api/scenarios
///
/// Replace the whole scenario set. The new set is validated and written to
/// the scenario file before it becomes visible; on error nothing changes.
pub async fn replace_scenarios(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Json<DataResponse<ScenarioMap>>> {
    let scenarios: ScenarioMap = serde_json::from_value(body).map_err(ScenarioError::from)?;
    state.scenarios.replace(scenarios).await?;
    Ok(Json(DataResponse {
        data: state.scenarios.list().await,
    }))
}

/// POST /api/scenarios/{id}/execute
///
/// Start a scenario as a background job. Returns 202 with the job id.
pub async fn execute_scenario(
    State(state): State<AppState>,
    Path(scenario_id): Path<String>,
    body: Option<Json<ExecuteScenario>>,
) -> AppResult<(StatusCode, Json<DataResponse<ScenarioAccepted>>)> {
    let Json(body) = body.unwrap_or_default();

    let scenario = state.scenarios.get(&scenario_id).await.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Scenario",
            id: scenario_id.clone(),
        })
    })?;

    let conversation = ConversationRepo::get_or_create(
        &state.pool,
        body.conversation_id,
        Some(&format!("Scenario: {}", scenario.name)),
    )
    .await?;
    let user_message = ConversationRepo::add_message(
        &state.pool,
        conversation.id,
        MessageRole::User,
        &format!("Run scenario '{scenario_id}'"),
        Some(&json!({ "scenario_id": scenario_id, "inputs": body.inputs })),
    )
    .await?;

    let input = CreateJob {
        title: scenario.name.clone(),
        endpoint: format!("scenario:{scenario_id}"),
        params: Value::Object(body.inputs.clone()),
        conversation_id: Some(conversation.id),
        message_id: Some(user_message.id),
    };
    let job = state
        .runner
        .submit(
            &input,
            JobKind::Scenario {
                scenario_id: scenario_id.clone(),
                inputs: body.inputs,
            },
        )
        .await?;

    tracing::info!(job_id = %job.id, scenario = %scenario_id, "Scenario execution accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ScenarioAccepted {
                job_id: job.id,
                conversation_id: conversation.id,
            },
        }),
    ))
}
