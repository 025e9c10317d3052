//! Stored upload records.

use serde::Serialize;
use sqlx::FromRow;
use mediaflow_core::types::{EntityId, Timestamp};

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: EntityId,
    pub filename: String,
    pub stored_filename: String,
    pub original_name: String,
    pub url: String,
    pub file_type: String,
    pub extension: String,
    pub size: i64,
    pub hash: String,
    pub created_at: Timestamp,
}

/// Input for recording a stored upload.
#[derive(Debug, Clone)]
pub struct CreateAsset {
    pub filename: String,
    pub stored_filename: String,
    pub original_name: String,
    pub url: String,
    pub file_type: String,
    pub extension: String,
    pub size: i64,
    pub hash: String,
}
