//! Master-key chain and KEK chain.
//!
//! Both chains are read-only after construction and own their plaintext
//! key material for the process lifetime; the material zeroizes when the
//! chain is dropped. Chains are shared across threads behind `Arc` without
//! locking.

use crate::config::MasterKeySpec;
use crate::crypto::cipher::{Algorithm, KEY_LEN};
use crate::error::VaultError;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroizing;

/// A root symmetric key supplied to the process at startup. Never persisted.
#[derive(Clone)]
pub struct MasterKey {
    id: String,
    key: Zeroizing<Vec<u8>>,
}

impl MasterKey {
    /// Construct a master key from its ID and 32 bytes of material.
    pub fn new(id: impl Into<String>, key: Zeroizing<Vec<u8>>) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::invalid_key(format!(
                "master key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        Ok(Self { id: id.into(), key })
    }

    /// Stable textual identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Plaintext key material.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("id", &self.id)
            .field("key", &"[redacted]")
            .finish()
    }
}

/// Insertion-ordered set of master keys with one designated active.
#[derive(Debug)]
pub struct MasterKeyChain {
    keys: Vec<MasterKey>,
    active_idx: usize,
}

impl MasterKeyChain {
    /// Build a chain from configuration entries.
    ///
    /// The active ID must be present in `specs`; each key must be 32 bytes.
    pub fn new(specs: Vec<MasterKeySpec>, active_id: &str) -> Result<Self, VaultError> {
        if specs.is_empty() {
            return Err(VaultError::config("master key chain cannot be empty"));
        }

        let mut keys = Vec::with_capacity(specs.len());
        for spec in specs {
            if keys.iter().any(|k: &MasterKey| k.id() == spec.id) {
                return Err(VaultError::config(format!(
                    "duplicate master key ID '{}'",
                    spec.id
                )));
            }
            keys.push(MasterKey::new(spec.id, spec.key)?);
        }

        let active_idx = keys
            .iter()
            .position(|k| k.id() == active_id)
            .ok_or_else(|| VaultError::MasterKeyNotFound(active_id.to_string()))?;

        Ok(Self { keys, active_idx })
    }

    /// Look up a master key by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MasterKey> {
        self.keys.iter().find(|k| k.id() == id)
    }

    /// The key designated active for wrapping new KEKs.
    #[must_use]
    pub fn active(&self) -> &MasterKey {
        &self.keys[self.active_idx]
    }

    /// ID of the active master key.
    #[must_use]
    pub fn active_id(&self) -> &str {
        self.active().id()
    }

    /// Number of keys in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the chain holds no keys. Always false post-construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A KEK with its plaintext material unwrapped into memory.
#[derive(Clone)]
pub struct UnwrappedKek {
    /// Unique identifier
    pub id: Uuid,
    /// Monotonic version within the chain
    pub version: i32,
    /// AEAD algorithm this KEK wraps DEKs with
    pub algorithm: Algorithm,
    /// ID of the master key this KEK is persisted under
    pub master_key_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    key: Zeroizing<Vec<u8>>,
}

impl UnwrappedKek {
    /// Construct an unwrapped KEK from its attributes and 32-byte material.
    pub fn new(
        id: Uuid,
        version: i32,
        algorithm: Algorithm,
        master_key_id: impl Into<String>,
        created_at: DateTime<Utc>,
        key: Zeroizing<Vec<u8>>,
    ) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::invalid_key(format!(
                "KEK must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        Ok(Self {
            id,
            version,
            algorithm,
            master_key_id: master_key_id.into(),
            created_at,
            key,
        })
    }

    /// Plaintext key material.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for UnwrappedKek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnwrappedKek")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("algorithm", &self.algorithm)
            .field("master_key_id", &self.master_key_id)
            .field("key", &"[redacted]")
            .finish()
    }
}

/// Ordered set of unwrapped KEKs, descending by version; the highest
/// version is active.
#[derive(Debug)]
pub struct KekChain {
    keks: Vec<UnwrappedKek>,
}

impl KekChain {
    /// Build a chain from unwrapped KEKs. Fails on an empty set.
    pub fn new(mut keks: Vec<UnwrappedKek>) -> Result<Self, VaultError> {
        if keks.is_empty() {
            return Err(VaultError::internal("KEK chain cannot be empty"));
        }
        keks.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(Self { keks })
    }

    /// Look up a KEK by ID.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&UnwrappedKek> {
        self.keks.iter().find(|k| k.id == id)
    }

    /// The highest-version KEK, used to wrap new DEKs.
    #[must_use]
    pub fn active(&self) -> &UnwrappedKek {
        &self.keks[0]
    }

    /// Number of KEK versions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keks.len()
    }

    /// Whether the chain holds no KEKs. Always false post-construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, byte: u8) -> MasterKeySpec {
        MasterKeySpec {
            id: id.to_string(),
            key: Zeroizing::new(vec![byte; KEY_LEN]),
        }
    }

    fn unwrapped_kek(version: i32) -> UnwrappedKek {
        UnwrappedKek::new(
            Uuid::now_v7(),
            version,
            Algorithm::AesGcm,
            "mk1",
            Utc::now(),
            Zeroizing::new(vec![version as u8; KEY_LEN]),
        )
        .unwrap()
    }

    #[test]
    fn test_master_chain_lookup_and_active() {
        let chain =
            MasterKeyChain::new(vec![spec("mk1", 1), spec("mk2", 2)], "mk2").unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.active_id(), "mk2");
        assert_eq!(chain.active().key(), &[2u8; KEY_LEN]);
        assert!(chain.get("mk1").is_some());
        assert!(chain.get("mk3").is_none());
    }

    #[test]
    fn test_master_chain_rejects_missing_active() {
        let result = MasterKeyChain::new(vec![spec("mk1", 1)], "mk9");
        assert!(matches!(result, Err(VaultError::MasterKeyNotFound(_))));
    }

    #[test]
    fn test_master_chain_rejects_duplicates_and_empty() {
        assert!(MasterKeyChain::new(vec![], "mk1").is_err());
        assert!(MasterKeyChain::new(vec![spec("mk1", 1), spec("mk1", 2)], "mk1").is_err());
    }

    #[test]
    fn test_master_key_rejects_short_material() {
        let result = MasterKey::new("mk1", Zeroizing::new(vec![0u8; 16]));
        assert!(matches!(result, Err(VaultError::InvalidKey(_))));
    }

    #[test]
    fn test_kek_chain_orders_by_version_desc() {
        let chain =
            KekChain::new(vec![unwrapped_kek(1), unwrapped_kek(3), unwrapped_kek(2)]).unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.active().version, 3);
    }

    #[test]
    fn test_kek_chain_get_by_id() {
        let kek = unwrapped_kek(1);
        let id = kek.id;
        let chain = KekChain::new(vec![kek, unwrapped_kek(2)]).unwrap();

        assert_eq!(chain.get(id).map(|k| k.version), Some(1));
        assert!(chain.get(Uuid::now_v7()).is_none());
    }

    #[test]
    fn test_kek_chain_rejects_empty() {
        assert!(KekChain::new(vec![]).is_err());
    }

    #[test]
    fn test_debug_output_redacts_material() {
        let chain = MasterKeyChain::new(vec![spec("mk1", 0xAB)], "mk1").unwrap();
        let rendered = format!("{:?}", chain);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("171"));

        let rendered = format!("{:?}", unwrapped_kek(1));
        assert!(rendered.contains("redacted"));
    }
}
