//! Tokenization engine: tokenize, detokenize, validate, revoke, and
//! expired-token cleanup.
//!
//! Unwrapped DEK material lives inside a single scope per operation under
//! a zeroizing guard; it is released on every exit path, including error
//! returns and unwinding. Crypto failures of any stage are reported as the
//! opaque decryption failure.

use crate::crypto::chain::KekChain;
use crate::crypto::cipher::{AeadCipher, Algorithm};
use crate::crypto::keys::KeyManager;
use crate::error::VaultError;
use crate::metrics;
use crate::storage::models::{TokenRecord, TokenizationKey};
use crate::storage::{DekRepository, TokenRepository, TokenizationKeyRepository};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPool;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Maximum accepted plaintext size in bytes.
pub const MAX_PLAINTEXT_BYTES: usize = 65_536;

/// Result of a detokenize call.
///
/// The plaintext buffer zeroizes itself when dropped; callers must zero
/// their own copies if they make any.
#[derive(Debug)]
pub struct Detokenized {
    /// Recovered plaintext
    pub plaintext: Zeroizing<Vec<u8>>,
    /// Display-only metadata stored with the token
    pub metadata: Option<Value>,
}

/// The tokenization engine.
pub struct TokenizationEngine {
    pool: PgPool,
    kek_chain: Arc<KekChain>,
    keys: TokenizationKeyRepository,
    deks: DekRepository,
    tokens: TokenRepository,
    detokenize_deleted_keys: bool,
}

impl TokenizationEngine {
    /// Create an engine over the shared pool and KEK chain.
    ///
    /// `detokenize_deleted_keys` controls whether tokens whose key was
    /// soft-deleted remain reversible.
    #[must_use]
    pub fn new(pool: PgPool, kek_chain: Arc<KekChain>, detokenize_deleted_keys: bool) -> Self {
        Self {
            pool,
            kek_chain,
            keys: TokenizationKeyRepository,
            deks: DekRepository,
            tokens: TokenRepository,
            detokenize_deleted_keys,
        }
    }

    /// Tokenize a plaintext under the named key's latest version.
    ///
    /// For deterministic keys an existing valid token for the same
    /// plaintext is returned verbatim. A successful return means the token
    /// record is durable.
    #[instrument(skip(self, plaintext, metadata), fields(key_name = %key_name))]
    pub async fn tokenize(
        &self,
        key_name: &str,
        plaintext: &[u8],
        metadata: Option<Value>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TokenRecord, VaultError> {
        if plaintext.is_empty() {
            return Err(VaultError::PlaintextEmpty);
        }
        if plaintext.len() > MAX_PLAINTEXT_BYTES {
            return Err(VaultError::PlaintextTooLarge(plaintext.len()));
        }

        let key = self
            .keys
            .get_by_name(&self.pool, key_name)
            .await?
            .ok_or_else(|| VaultError::TokenizationKeyNotFound(key_name.to_string()))?;

        let value_hash = key
            .is_deterministic
            .then(|| hex::encode(Sha256::digest(plaintext)));

        // Deterministic replay: an existing valid token wins outright.
        if let Some(hash) = &value_hash {
            if let Some(existing) = self
                .tokens
                .get_by_value_hash(&self.pool, key.id, hash)
                .await?
            {
                if existing.is_valid(Utc::now()) && hash_matches(&existing, hash) {
                    return Ok(existing);
                }
            }
        }

        let (algorithm, dek_plain) = self.unwrap_dek(&key).await?;
        let cipher = open_cipher(algorithm, &dek_plain)?;
        drop(dek_plain);

        let encrypted = cipher.encrypt(plaintext, None);
        metrics::record_crypto_operation(
            "encrypt",
            algorithm.as_str(),
            if encrypted.is_ok() { "ok" } else { "error" },
        );
        let (ciphertext, nonce) = encrypted.map_err(|_| VaultError::DecryptionFailed)?;

        let token = key.format_type.generate(plaintext.len())?;

        let record = TokenRecord {
            id: Uuid::now_v7(),
            tokenization_key_id: key.id,
            token,
            value_hash: value_hash.clone(),
            ciphertext,
            nonce,
            metadata,
            created_at: Utc::now(),
            expires_at,
            revoked_at: None,
        };

        match self.tokens.create(&self.pool, &record).await {
            Ok(()) => {
                metrics::record_token_created(key.format_type.as_str(), key.is_deterministic);
                Ok(record)
            }
            Err(err) if err.is_conflict() && key.is_deterministic => {
                // Lost the deterministic double-insert race; the winner's
                // row is the caller's token.
                let hash = value_hash.as_deref().unwrap_or_default();
                match self
                    .tokens
                    .get_by_value_hash(&self.pool, key.id, hash)
                    .await
                {
                    Ok(Some(winner)) if hash_matches(&winner, hash) => {
                        warn!(key_id = %key.id, "Deterministic insert conflict, returning race winner");
                        Ok(winner)
                    }
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Reverse a token back to its plaintext and metadata.
    #[instrument(skip(self, token))]
    pub async fn detokenize(&self, token: &str) -> Result<Detokenized, VaultError> {
        let record = match self.tokens.get_by_token(&self.pool, token).await? {
            Some(record) => record,
            None => {
                metrics::record_detokenize("not_found");
                return Err(VaultError::TokenNotFound);
            }
        };

        let now = Utc::now();
        if record.is_expired(now) {
            metrics::record_detokenize("expired");
            return Err(VaultError::TokenExpired);
        }
        if record.is_revoked() {
            metrics::record_detokenize("revoked");
            return Err(VaultError::TokenRevoked);
        }

        let key = match self.resolve_key(record.tokenization_key_id).await? {
            Some(key) => key,
            None => {
                metrics::record_detokenize("key_missing");
                return Err(VaultError::TokenizationKeyNotFound(
                    record.tokenization_key_id.to_string(),
                ));
            }
        };

        let (algorithm, dek_plain) = self.unwrap_dek(&key).await?;
        let cipher = open_cipher(algorithm, &dek_plain)?;
        drop(dek_plain);

        let decrypted = cipher.decrypt(&record.ciphertext, &record.nonce, None);
        metrics::record_crypto_operation(
            "decrypt",
            algorithm.as_str(),
            if decrypted.is_ok() { "ok" } else { "error" },
        );
        let plaintext = decrypted.map_err(|_| {
            metrics::record_detokenize("decryption_failed");
            VaultError::DecryptionFailed
        })?;

        metrics::record_detokenize("ok");
        Ok(Detokenized {
            plaintext,
            metadata: record.metadata,
        })
    }

    /// Check whether a token exists and is neither expired nor revoked.
    ///
    /// A missing token cleanly yields `false`; other errors propagate.
    #[instrument(skip(self, token))]
    pub async fn validate(&self, token: &str) -> Result<bool, VaultError> {
        match self.tokens.get_by_token(&self.pool, token).await? {
            Some(record) => Ok(record.is_valid(Utc::now())),
            None => Ok(false),
        }
    }

    /// Revoke a token. Idempotent in effect; revoking an already-revoked
    /// token succeeds and refreshes its `revoked_at`.
    #[instrument(skip(self, token))]
    pub async fn revoke(&self, token: &str) -> Result<(), VaultError> {
        // Fetch first so a miss surfaces as not-found before any write.
        if self
            .tokens
            .get_by_token(&self.pool, token)
            .await?
            .is_none()
        {
            metrics::record_revoke("not_found");
            return Err(VaultError::TokenNotFound);
        }

        self.tokens.revoke(&self.pool, token, Utc::now()).await?;
        metrics::record_revoke("ok");
        Ok(())
    }

    /// Remove tokens that expired more than `days` days ago.
    ///
    /// Dry runs only count. Returns the affected row count either way.
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self, days: i64, dry_run: bool) -> Result<u64, VaultError> {
        if days < 0 {
            return Err(VaultError::invalid_input(format!(
                "cleanup days must not be negative, got {}",
                days
            )));
        }
        let cutoff = Utc::now() - Duration::days(days);

        let removed = if dry_run {
            let count = self.tokens.count_expired(&self.pool, cutoff).await?;
            u64::try_from(count).unwrap_or_default()
        } else {
            let count = self.tokens.delete_expired(&self.pool, cutoff).await?;
            info!(removed = count, "Expired tokens removed");
            count
        };

        metrics::record_cleanup(dry_run, removed);
        Ok(removed)
    }

    /// Resolve a token's owning key, honoring the soft-delete policy.
    async fn resolve_key(&self, id: Uuid) -> Result<Option<TokenizationKey>, VaultError> {
        if self.detokenize_deleted_keys {
            self.keys.get_including_deleted(&self.pool, id).await
        } else {
            self.keys.get(&self.pool, id).await
        }
    }

    /// Fetch and unwrap the key's DEK under its KEK from the chain.
    async fn unwrap_dek(
        &self,
        key: &TokenizationKey,
    ) -> Result<(Algorithm, Zeroizing<Vec<u8>>), VaultError> {
        let dek = self
            .deks
            .get(&self.pool, key.dek_id)
            .await?
            .ok_or(VaultError::DekNotFound(key.dek_id))?;
        let kek = self
            .kek_chain
            .get(dek.kek_id)
            .ok_or(VaultError::KekNotFound(dek.kek_id))?;
        let plain = KeyManager::decrypt_dek(&dek, kek)?;
        Ok((dek.algorithm, plain))
    }
}

/// Instantiate the data cipher, masking key-shape failures opaquely.
fn open_cipher(algorithm: Algorithm, dek_plain: &[u8]) -> Result<AeadCipher, VaultError> {
    AeadCipher::new(algorithm, dek_plain).map_err(|_| VaultError::DecryptionFailed)
}

fn hash_matches(record: &TokenRecord, hash: &str) -> bool {
    record
        .value_hash
        .as_deref()
        .is_some_and(|stored| stored.as_bytes().ct_eq(hash.as_bytes()).into())
}

/// Compute an absolute expiry from a TTL in seconds.
///
/// The boundary layer translates request TTLs with this before calling
/// [`TokenizationEngine::tokenize`].
pub fn expires_at_from_ttl(
    now: DateTime<Utc>,
    ttl_seconds: i64,
) -> Result<DateTime<Utc>, VaultError> {
    if ttl_seconds <= 0 {
        return Err(VaultError::invalid_input(format!(
            "ttl must be positive, got {}",
            ttl_seconds
        )));
    }
    Ok(now + Duration::seconds(ttl_seconds))
}
