use axum::extract::{Query, State};
use axum::Json;
use mediaflow_db::models::conversation::ConversationWithMessages;
use mediaflow_db::repositories::ConversationRepo;

use crate::error::AppResult;
use crate::query::LimitParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/history
///
/// Recently active conversations with their messages, oldest message first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<DataResponse<Vec<ConversationWithMessages>>>> {
    let history = ConversationRepo::list_history(&state.pool, params.limit).await?;
    Ok(Json(DataResponse { data: history }))
}
