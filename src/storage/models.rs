//! Persisted row types.

use crate::crypto::cipher::Algorithm;
use crate::error::VaultError;
use crate::tokenization::generator::TokenFormat;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A key encryption key, persisted wrapped under a master key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Kek {
    /// Unique identifier
    pub id: Uuid,
    /// ID of the master key that wrapped this KEK
    pub master_key_id: String,
    /// AEAD algorithm used for the wrap
    #[sqlx(try_from = "String")]
    pub algorithm: Algorithm,
    /// Wrapped key ciphertext
    pub encrypted_key: Vec<u8>,
    /// Nonce used for the wrap
    pub nonce: Vec<u8>,
    /// Monotonic version within the chain
    pub version: i32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A data encryption key, persisted wrapped under exactly one KEK.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Dek {
    /// Unique identifier
    pub id: Uuid,
    /// Owning KEK
    pub kek_id: Uuid,
    /// AEAD algorithm used both for the wrap and for data encryption
    #[sqlx(try_from = "String")]
    pub algorithm: Algorithm,
    /// Wrapped key ciphertext
    pub encrypted_key: Vec<u8>,
    /// Nonce used for the wrap
    pub nonce: Vec<u8>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A named, versioned configuration binding a namespace to a DEK and
/// tokenization policy.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenizationKey {
    /// Unique identifier
    pub id: Uuid,
    /// Logical namespace, e.g. `payment-cards`
    pub name: String,
    /// Monotonic version per name, starting at 1
    pub version: i32,
    /// Token label format
    #[sqlx(try_from = "String")]
    pub format_type: TokenFormat,
    /// Whether equal plaintexts yield equal tokens under this version
    pub is_deterministic: bool,
    /// DEK owned by this version
    pub dek_id: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp; deleted rows are hidden from lookups
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TokenizationKey {
    /// Validate structural invariants before persisting.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.name.is_empty() {
            return Err(VaultError::invalid_input("tokenization key name is empty"));
        }
        if self.version < 1 {
            return Err(VaultError::invalid_input(format!(
                "tokenization key version must be positive, got {}",
                self.version
            )));
        }
        if self.dek_id.is_nil() {
            return Err(VaultError::invalid_input("tokenization key DEK ID is nil"));
        }
        Ok(())
    }
}

/// A persistent mapping from a token string to the AEAD ciphertext of the
/// original plaintext. Holds no key material.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRecord {
    /// Unique identifier
    pub id: Uuid,
    /// Owning tokenization-key version
    pub tokenization_key_id: Uuid,
    /// Globally unique token string
    pub token: String,
    /// SHA-256 hex of the plaintext; present iff the key is deterministic
    pub value_hash: Option<String>,
    /// AEAD ciphertext of the plaintext
    pub ciphertext: Vec<u8>,
    /// Nonce used for the encryption
    pub nonce: Vec<u8>,
    /// Display-only metadata, never encrypted, never trusted as sensitive
    pub metadata: Option<Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Optional expiry; past-expiry tokens fail detokenize
    pub expires_at: Option<DateTime<Utc>>,
    /// Set on revocation; revoked tokens fail detokenize
    pub revoked_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Whether the token's expiry has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Whether the token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether the token is in the only state detokenize succeeds in.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_revoked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> TokenRecord {
        TokenRecord {
            id: Uuid::now_v7(),
            tokenization_key_id: Uuid::now_v7(),
            token: "tok".to_string(),
            value_hash: None,
            ciphertext: vec![1, 2, 3],
            nonce: vec![0; 12],
            metadata: None,
            created_at: Utc::now(),
            expires_at: None,
            revoked_at: None,
        }
    }

    #[test]
    fn test_token_lifecycle_states() {
        let now = Utc::now();

        let active = record();
        assert!(active.is_valid(now));

        let mut expired = record();
        expired.expires_at = Some(now - Duration::seconds(1));
        assert!(expired.is_expired(now));
        assert!(!expired.is_valid(now));

        let mut future = record();
        future.expires_at = Some(now + Duration::hours(1));
        assert!(!future.is_expired(now));
        assert!(future.is_valid(now));

        let mut revoked = record();
        revoked.revoked_at = Some(now);
        assert!(revoked.is_revoked());
        assert!(!revoked.is_valid(now));
    }

    #[test]
    fn test_tokenization_key_validation() {
        let key = TokenizationKey {
            id: Uuid::now_v7(),
            name: "payment-cards".to_string(),
            version: 1,
            format_type: TokenFormat::LuhnPreserving,
            is_deterministic: true,
            dek_id: Uuid::now_v7(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(key.validate().is_ok());

        let mut empty_name = key.clone();
        empty_name.name.clear();
        assert!(empty_name.validate().is_err());

        let mut bad_version = key.clone();
        bad_version.version = 0;
        assert!(bad_version.validate().is_err());

        let mut nil_dek = key;
        nil_dek.dek_id = Uuid::nil();
        assert!(nil_dek.validate().is_err());
    }
}
