//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Bounded listing (`?limit=`). Values are clamped by the caller or the
/// repository layer.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}
