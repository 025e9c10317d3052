use axum::Json;
use mediaflow_core::catalog::{self, Operation};

use crate::response::DataResponse;

/// GET /api/endpoints
///
/// The operation catalog with categories and parameter lists.
pub async fn list_endpoints() -> Json<DataResponse<&'static [Operation]>> {
    Json(DataResponse {
        data: catalog::operations(),
    })
}
