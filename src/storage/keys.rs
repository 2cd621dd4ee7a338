//! KEK and DEK repositories, plus KEK chain loading at startup.

use crate::crypto::chain::{KekChain, MasterKeyChain, UnwrappedKek};
use crate::crypto::cipher::Algorithm;
use crate::crypto::keys::KeyManager;
use crate::error::VaultError;
use crate::storage::models::{Dek, Kek};
use sqlx::postgres::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

/// Repository over the `kek` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct KekRepository;

impl KekRepository {
    /// Insert a wrapped KEK.
    pub async fn create(
        &self,
        exec: impl PgExecutor<'_>,
        kek: &Kek,
    ) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO kek (id, master_key_id, algorithm, encrypted_key, nonce, version, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(kek.id)
        .bind(&kek.master_key_id)
        .bind(kek.algorithm.as_str())
        .bind(&kek.encrypted_key)
        .bind(&kek.nonce)
        .bind(kek.version)
        .bind(kek.created_at)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;
        Ok(())
    }

    /// Fetch a wrapped KEK by ID.
    pub async fn get(
        &self,
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Kek>, VaultError> {
        sqlx::query_as::<_, Kek>(
            "SELECT id, master_key_id, algorithm, encrypted_key, nonce, version, created_at
             FROM kek WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Fetch every KEK, descending by version.
    pub async fn list_all(&self, exec: impl PgExecutor<'_>) -> Result<Vec<Kek>, VaultError> {
        sqlx::query_as::<_, Kek>(
            "SELECT id, master_key_id, algorithm, encrypted_key, nonce, version, created_at
             FROM kek ORDER BY version DESC",
        )
        .fetch_all(exec)
        .await
        .map_err(VaultError::from_db)
    }

    /// Load the KEK chain, bootstrapping version 1 on an empty table.
    ///
    /// Every persisted KEK is unwrapped under its master key; a KEK whose
    /// master key is absent from the chain makes startup fail rather than
    /// leaving part of the hierarchy unreadable.
    pub async fn load_chain(
        &self,
        pool: &PgPool,
        masters: &MasterKeyChain,
    ) -> Result<KekChain, VaultError> {
        let mut rows = self.list_all(pool).await?;

        if rows.is_empty() {
            let record = KeyManager::create_kek(masters.active(), 1, Algorithm::AesGcm)?;
            match self.create(pool, &record).await {
                Ok(()) => {
                    info!(kek_id = %record.id, "Bootstrapped KEK chain at version 1");
                    rows = vec![record];
                }
                // Another instance won the bootstrap race; take its chain.
                Err(err) if err.is_conflict() => {
                    rows = self.list_all(pool).await?;
                }
                Err(err) => return Err(err),
            }
        }

        let mut unwrapped = Vec::with_capacity(rows.len());
        for row in &rows {
            let master = masters
                .get(&row.master_key_id)
                .ok_or_else(|| VaultError::MasterKeyNotFound(row.master_key_id.clone()))?;
            let key = KeyManager::decrypt_kek(row, master)?;
            unwrapped.push(UnwrappedKek::new(
                row.id,
                row.version,
                row.algorithm,
                row.master_key_id.clone(),
                row.created_at,
                key,
            )?);
        }

        let chain = KekChain::new(unwrapped)?;
        info!(
            versions = chain.len(),
            active_version = chain.active().version,
            "KEK chain loaded"
        );
        Ok(chain)
    }
}

/// Repository over the `dek` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DekRepository;

impl DekRepository {
    /// Insert a wrapped DEK.
    pub async fn create(
        &self,
        exec: impl PgExecutor<'_>,
        dek: &Dek,
    ) -> Result<(), VaultError> {
        sqlx::query(
            "INSERT INTO dek (id, kek_id, algorithm, encrypted_key, nonce, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(dek.id)
        .bind(dek.kek_id)
        .bind(dek.algorithm.as_str())
        .bind(&dek.encrypted_key)
        .bind(&dek.nonce)
        .bind(dek.created_at)
        .execute(exec)
        .await
        .map_err(VaultError::from_db)?;
        Ok(())
    }

    /// Fetch a wrapped DEK by ID.
    pub async fn get(
        &self,
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Dek>, VaultError> {
        sqlx::query_as::<_, Dek>(
            "SELECT id, kek_id, algorithm, encrypted_key, nonce, created_at
             FROM dek WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(VaultError::from_db)
    }
}
