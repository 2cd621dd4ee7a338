//! Tokenization-key repository.
//!
//! Soft-deleted rows are hidden from every lookup except
//! [`TokenizationKeyRepository::get_including_deleted`], which exists for
//! the operator-configurable detokenize path.

use crate::error::VaultError;
use crate::storage::models::TokenizationKey;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

const COLUMNS: &str =
    "id, name, version, format_type, is_deterministic, dek_id, created_at, deleted_at";

/// Repository over the `tokenization_keys` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenizationKeyRepository;

impl TokenizationKeyRepository {
    /// Insert a tokenization-key version.
    pub async fn create(
        &self,
        exec: impl PgExecutor<'_>,
        key: &TokenizationKey,
    ) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO tokenization_keys
                 (id, name, version, format_type, is_deterministic, dek_id, created_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(key.id)
        .bind(&key.name)
        .bind(key.version)
        .bind(key.format_type.as_str())
        .bind(key.is_deterministic)
        .bind(key.dek_id)
        .bind(key.created_at)
        .bind(key.deleted_at)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;
        Ok(())
    }

    /// Fetch a non-deleted version by ID.
    pub async fn get(
        &self,
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<TokenizationKey>, VaultError> {
        sqlx::query_as::<_, TokenizationKey>(&format!(
            "SELECT {COLUMNS} FROM tokenization_keys WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Fetch a version by ID regardless of soft-deletion.
    pub async fn get_including_deleted(
        &self,
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<TokenizationKey>, VaultError> {
        sqlx::query_as::<_, TokenizationKey>(&format!(
            "SELECT {COLUMNS} FROM tokenization_keys WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Fetch the latest non-deleted version for a name.
    pub async fn get_by_name(
        &self,
        exec: impl PgExecutor<'_>,
        name: &str,
    ) -> Result<Option<TokenizationKey>, VaultError> {
        sqlx::query_as::<_, TokenizationKey>(&format!(
            "SELECT {COLUMNS} FROM tokenization_keys
             WHERE name = $1 AND deleted_at IS NULL
             ORDER BY version DESC LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Fetch a specific non-deleted version for a name.
    pub async fn get_by_name_and_version(
        &self,
        exec: impl PgExecutor<'_>,
        name: &str,
        version: i32,
    ) -> Result<Option<TokenizationKey>, VaultError> {
        sqlx::query_as::<_, TokenizationKey>(&format!(
            "SELECT {COLUMNS} FROM tokenization_keys
             WHERE name = $1 AND version = $2 AND deleted_at IS NULL"
        ))
        .bind(name)
        .bind(version)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// List the latest non-deleted version per name, name-ascending.
    pub async fn list(
        &self,
        exec: impl PgExecutor<'_>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TokenizationKey>, VaultError> {
        sqlx::query_as::<_, TokenizationKey>(&format!(
            "SELECT DISTINCT ON (name) {COLUMNS} FROM tokenization_keys
             WHERE deleted_at IS NULL
             ORDER BY name ASC, version DESC
             OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Soft-delete a version by setting its `deleted_at`.
    pub async fn soft_delete(
        &self,
        exec: impl PgExecutor<'_>,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let result = sqlx::query(
            "UPDATE tokenization_keys SET deleted_at = $2
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;

        if result.rows_affected() == 0 {
            return Err(VaultError::TokenizationKeyNotFound(id.to_string()));
        }
        Ok(())
    }
}
