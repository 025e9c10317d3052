//! Repository for the `assets` table (content-addressed uploads).

use chrono::Utc;

use crate::models::asset::{Asset, CreateAsset};
use crate::DbPool;

const COLUMNS: &str = "\
    id, filename, stored_filename, original_name, url, file_type, extension, \
    size, hash, created_at";

pub struct AssetRepo;

impl AssetRepo {
    pub async fn find_by_hash(pool: &DbPool, hash: &str) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE hash = ?");
        sqlx::query_as::<_, Asset>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Record an asset unless one with the same hash exists.
    ///
    /// Returns the stored row and whether this call inserted it. When two
    /// uploads of the same content race, exactly one insert wins and both
    /// callers get the winning row.
    pub async fn insert_or_get(
        pool: &DbPool,
        input: &CreateAsset,
    ) -> Result<(Asset, bool), sqlx::Error> {
        let query = format!(
            "INSERT INTO assets (id, filename, stored_filename, original_name, url, file_type, \
                                 extension, size, hash, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (hash) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Asset>(&query)
            .bind(uuid::Uuid::new_v4())
            .bind(&input.filename)
            .bind(&input.stored_filename)
            .bind(&input.original_name)
            .bind(&input.url)
            .bind(&input.file_type)
            .bind(&input.extension)
            .bind(input.size)
            .bind(&input.hash)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(asset) => Ok((asset, true)),
            None => {
                let existing = Self::find_by_hash(pool, &input.hash)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, false))
            }
        }
    }
}
