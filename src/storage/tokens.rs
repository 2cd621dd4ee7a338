//! Token repository.

use crate::error::VaultError;
use crate::storage::models::TokenRecord;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

const COLUMNS: &str = "id, tokenization_key_id, token, value_hash, ciphertext, nonce, \
                       metadata, created_at, expires_at, revoked_at";

/// Repository over the `tokenization_tokens` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenRepository;

impl TokenRepository {
    /// Insert a token record.
    ///
    /// Unique collisions (token string, or `(key, value_hash)` for
    /// deterministic keys) surface as [`VaultError::Conflict`].
    pub async fn create(
        &self,
        exec: impl PgExecutor<'_>,
        record: &TokenRecord,
    ) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO tokenization_tokens
                 (id, tokenization_key_id, token, value_hash, ciphertext, nonce,
                  metadata, created_at, expires_at, revoked_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.id)
        .bind(record.tokenization_key_id)
        .bind(&record.token)
        .bind(&record.value_hash)
        .bind(&record.ciphertext)
        .bind(&record.nonce)
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;
        Ok(())
    }

    /// Fetch a record by its token string.
    pub async fn get_by_token(
        &self,
        exec: impl PgExecutor<'_>,
        token: &str,
    ) -> Result<Option<TokenRecord>, VaultError> {
        sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {COLUMNS} FROM tokenization_tokens WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Fetch a record by `(key version, value hash)` for deterministic replay.
    pub async fn get_by_value_hash(
        &self,
        exec: impl PgExecutor<'_>,
        tokenization_key_id: Uuid,
        value_hash: &str,
    ) -> Result<Option<TokenRecord>, VaultError> {
        sqlx::query_as::<_, TokenRecord>(&format!(
            "SELECT {COLUMNS} FROM tokenization_tokens
             WHERE tokenization_key_id = $1 AND value_hash = $2"
        ))
        .bind(tokenization_key_id)
        .bind(value_hash)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Set `revoked_at` on a token.
    ///
    /// Fails with [`VaultError::TokenNotFound`] when no row matched; a
    /// second revocation of the same token matches and succeeds.
    pub async fn revoke(
        &self,
        exec: impl PgExecutor<'_>,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let result = sqlx::query(
            "UPDATE tokenization_tokens SET revoked_at = $2 WHERE token = $1",
        )
        .bind(token)
        .bind(now)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;

        if result.rows_affected() == 0 {
            return Err(VaultError::TokenNotFound);
        }
        Ok(())
    }

    /// Count tokens whose expiry precedes `cutoff`.
    pub async fn count_expired(
        &self,
        exec: impl PgExecutor<'_>,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, VaultError> {
        reject_zero_timestamp(cutoff)?;
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM tokenization_tokens
             WHERE expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(cutoff)
        .fetch_one(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Delete tokens whose expiry precedes `cutoff`; returns the row count.
    pub async fn delete_expired(
        &self,
        exec: impl PgExecutor<'_>,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        reject_zero_timestamp(cutoff)?;
        let result = sqlx::query(
            "DELETE FROM tokenization_tokens
             WHERE expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(cutoff)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;
        Ok(result.rows_affected())
    }
}

fn reject_zero_timestamp(cutoff: DateTime<Utc>) -> Result<(), VaultError> {
    if cutoff.timestamp() == 0 && cutoff.timestamp_subsec_nanos() == 0 {
        return Err(VaultError::invalid_input(
            "cutoff timestamp must not be zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_zero_timestamp_rejected() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert!(reject_zero_timestamp(epoch).is_err());
        assert!(reject_zero_timestamp(Utc::now()).is_ok());
    }
}
