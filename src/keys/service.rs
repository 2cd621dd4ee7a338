//! Tokenization key service: create, rotate, soft-delete, and list named
//! tokenization keys. Each version owns its own DEK, minted under the
//! active KEK inside the same transaction that persists the key row.

use crate::crypto::chain::KekChain;
use crate::crypto::cipher::Algorithm;
use crate::crypto::keys::KeyManager;
use crate::error::VaultError;
use crate::storage::models::TokenizationKey;
use crate::storage::{DekRepository, TokenizationKeyRepository};
use crate::tokenization::generator::TokenFormat;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Maximum page size accepted by [`TokenizationKeyService::list`].
pub const MAX_LIST_LIMIT: i64 = 100;

/// Service over named, versioned tokenization keys.
pub struct TokenizationKeyService {
    pool: PgPool,
    kek_chain: Arc<KekChain>,
    keys: TokenizationKeyRepository,
    deks: DekRepository,
}

impl TokenizationKeyService {
    /// Create a service over the shared pool and KEK chain.
    #[must_use]
    pub fn new(pool: PgPool, kek_chain: Arc<KekChain>) -> Self {
        Self {
            pool,
            kek_chain,
            keys: TokenizationKeyRepository,
            deks: DekRepository,
        }
    }

    /// Create version 1 of a named tokenization key.
    ///
    /// Fails with [`VaultError::AlreadyExists`] when the name already has a
    /// version 1, whether via the pre-check or the unique index on
    /// `(name, version)`.
    #[instrument(skip(self), fields(name = %name, format = %format.as_str()))]
    pub async fn create(
        &self,
        name: &str,
        format: TokenFormat,
        deterministic: bool,
        algorithm: Algorithm,
    ) -> Result<TokenizationKey, VaultError> {
        if name.is_empty() {
            return Err(VaultError::invalid_input("tokenization key name is empty"));
        }

        let mut tx = self.pool.begin().await.map_err(VaultError::from_db)?;

        if self
            .keys
            .get_by_name_and_version(&mut *tx, name, 1)
            .await?
            .is_some()
        {
            return Err(VaultError::AlreadyExists(name.to_string()));
        }

        let key = self
            .insert_version(&mut tx, name, 1, format, deterministic, algorithm)
            .await
            .map_err(Self::name_conflict(name))?;

        tx.commit().await.map_err(VaultError::from_db)?;
        info!(key_id = %key.id, "Tokenization key created");
        Ok(key)
    }

    /// Rotate a named key to a new version with a fresh DEK.
    ///
    /// Falls through to create semantics when the name has no live
    /// version. Older versions are retained and remain usable for
    /// detokenization.
    #[instrument(skip(self), fields(name = %name, format = %format.as_str()))]
    pub async fn rotate(
        &self,
        name: &str,
        format: TokenFormat,
        deterministic: bool,
        algorithm: Algorithm,
    ) -> Result<TokenizationKey, VaultError> {
        if name.is_empty() {
            return Err(VaultError::invalid_input("tokenization key name is empty"));
        }

        let mut tx = self.pool.begin().await.map_err(VaultError::from_db)?;

        let version = match self.keys.get_by_name(&mut *tx, name).await? {
            Some(latest) => latest.version + 1,
            None => 1,
        };

        let key = self
            .insert_version(&mut tx, name, version, format, deterministic, algorithm)
            .await
            .map_err(Self::name_conflict(name))?;

        tx.commit().await.map_err(VaultError::from_db)?;
        info!(key_id = %key.id, version = key.version, "Tokenization key rotated");
        Ok(key)
    }

    /// Soft-delete a key version; subsequent lookups return not-found.
    #[instrument(skip(self), fields(key_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), VaultError> {
        self.keys.soft_delete(&self.pool, id, Utc::now()).await?;
        info!("Tokenization key deleted");
        Ok(())
    }

    /// Fetch a key version by ID.
    pub async fn get(&self, id: Uuid) -> Result<TokenizationKey, VaultError> {
        self.keys
            .get(&self.pool, id)
            .await?
            .ok_or_else(|| VaultError::TokenizationKeyNotFound(id.to_string()))
    }

    /// Fetch the latest live version for a name.
    pub async fn get_by_name(&self, name: &str) -> Result<TokenizationKey, VaultError> {
        self.keys
            .get_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| VaultError::TokenizationKeyNotFound(name.to_string()))
    }

    /// List the latest live version per name, name-ascending.
    ///
    /// `limit` must lie in `1..=100`; `offset` must be non-negative.
    pub async fn list(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TokenizationKey>, VaultError> {
        if offset < 0 {
            return Err(VaultError::invalid_input("offset must be non-negative"));
        }
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(VaultError::invalid_input(format!(
                "limit must be within 1..={}, got {}",
                MAX_LIST_LIMIT, limit
            )));
        }
        self.keys.list(&self.pool, offset, limit).await
    }

    /// Mint a DEK under the active KEK and persist it with the key row.
    async fn insert_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        version: i32,
        format: TokenFormat,
        deterministic: bool,
        algorithm: Algorithm,
    ) -> Result<TokenizationKey, VaultError> {
        let kek = self.kek_chain.active();
        let dek = KeyManager::create_dek(kek, algorithm)?;
        self.deks.create(&mut **tx, &dek).await?;

        let key = TokenizationKey {
            id: Uuid::now_v7(),
            name: name.to_string(),
            version,
            format_type: format,
            is_deterministic: deterministic,
            dek_id: dek.id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        key.validate()?;
        self.keys.create(&mut **tx, &key).await?;
        Ok(key)
    }

    /// Fold a `(name, version)` unique collision into `AlreadyExists`.
    fn name_conflict(name: &str) -> impl FnOnce(VaultError) -> VaultError {
        let name = name.to_string();
        move |err| {
            if err.is_conflict() {
                VaultError::AlreadyExists(name)
            } else {
                err
            }
        }
    }
}
