//! Key manager: creation and unwrapping of DEKs and KEKs.
//!
//! Performs no I/O. DEKs are wrapped under a KEK, KEKs under a master key;
//! both directions go through the AEAD cipher suite, so unwrap failures
//! surface as the same opaque error as any other decryption failure.

use crate::crypto::chain::{MasterKey, UnwrappedKek};
use crate::crypto::cipher::{AeadCipher, Algorithm, KEY_LEN};
use crate::error::VaultError;
use crate::storage::models::{Dek, Kek};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Creates and unwraps data and key encryption keys.
pub struct KeyManager;

impl KeyManager {
    /// Generate a fresh DEK wrapped under `kek`.
    ///
    /// The plaintext DEK exists only inside this call and is zeroed before
    /// returning; the result carries ciphertext and nonce only.
    pub fn create_dek(kek: &UnwrappedKek, algorithm: Algorithm) -> Result<Dek, VaultError> {
        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(key.as_mut_slice());

        let cipher = AeadCipher::new(algorithm, kek.key())?;
        let (encrypted_key, nonce) = cipher.encrypt(&key, None)?;

        Ok(Dek {
            id: Uuid::now_v7(),
            kek_id: kek.id,
            algorithm,
            encrypted_key,
            nonce,
            created_at: Utc::now(),
        })
    }

    /// Unwrap a DEK using the KEK's plaintext material.
    ///
    /// The returned buffer zeroizes on drop; callers must not copy it out
    /// of its guard.
    pub fn decrypt_dek(dek: &Dek, kek: &UnwrappedKek) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let cipher = AeadCipher::new(dek.algorithm, kek.key())?;
        cipher.decrypt(&dek.encrypted_key, &dek.nonce, None)
    }

    /// Generate a fresh KEK wrapped under `master`.
    pub fn create_kek(
        master: &MasterKey,
        version: i32,
        algorithm: Algorithm,
    ) -> Result<Kek, VaultError> {
        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        OsRng.fill_bytes(key.as_mut_slice());

        let cipher = AeadCipher::new(algorithm, master.key())?;
        let (encrypted_key, nonce) = cipher.encrypt(&key, None)?;

        Ok(Kek {
            id: Uuid::now_v7(),
            master_key_id: master.id().to_string(),
            algorithm,
            encrypted_key,
            nonce,
            version,
            created_at: Utc::now(),
        })
    }

    /// Unwrap a KEK using the master key's plaintext material.
    pub fn decrypt_kek(kek: &Kek, master: &MasterKey) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        let cipher = AeadCipher::new(kek.algorithm, master.key())?;
        cipher.decrypt(&kek.encrypted_key, &kek.nonce, None)
    }
}
