//! AEAD cipher suite over AES-256-GCM and ChaCha20-Poly1305.
//!
//! Every encrypt draws a fresh random 12-byte nonce; nonce reuse under one
//! key is a fatal correctness failure, so nonces are never accepted from
//! callers. Decryption failures are always surfaced as the opaque
//! [`VaultError::DecryptionFailed`].

use crate::error::VaultError;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// AEAD key length in bytes.
pub const KEY_LEN: usize = 32;

/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AEAD algorithm tag stored alongside every ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// AES-256-GCM
    AesGcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

impl Algorithm {
    /// Parse algorithm from its stored tag.
    pub fn from_str(s: &str) -> Result<Self, VaultError> {
        match s.to_lowercase().as_str() {
            "aes-gcm" => Ok(Self::AesGcm),
            "chacha20-poly1305" => Ok(Self::ChaCha20Poly1305),
            _ => Err(VaultError::invalid_input(format!(
                "invalid AEAD algorithm: {}",
                s
            ))),
        }
    }

    /// Get the stored tag for this algorithm.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AesGcm => "aes-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

enum CipherInner {
    AesGcm(Box<Aes256Gcm>),
    ChaCha(Box<ChaCha20Poly1305>),
}

/// Uniform encrypt/decrypt over a fixed 32-byte symmetric key.
pub struct AeadCipher {
    algorithm: Algorithm,
    inner: CipherInner,
}

impl AeadCipher {
    /// Instantiate a cipher over `key`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] unless `key` is exactly
    /// [`KEY_LEN`] bytes.
    pub fn new(algorithm: Algorithm, key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::invalid_key(format!(
                "AEAD key must be {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        let inner = match algorithm {
            Algorithm::AesGcm => CipherInner::AesGcm(Box::new(
                Aes256Gcm::new_from_slice(key)
                    .map_err(|_| VaultError::invalid_key("AES-256-GCM rejected key"))?,
            )),
            Algorithm::ChaCha20Poly1305 => CipherInner::ChaCha(Box::new(
                ChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| VaultError::invalid_key("ChaCha20-Poly1305 rejected key"))?,
            )),
        };
        Ok(Self { algorithm, inner })
    }

    /// Get the algorithm this cipher was built for.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Encrypt `plaintext`, returning `(ciphertext, nonce)`.
    ///
    /// The nonce is freshly random per call. When `aad` is supplied it must
    /// be provided byte-identical on decrypt.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Vec<u8>), VaultError> {
        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad: aad.unwrap_or_default(),
        };
        let ciphertext = match &self.inner {
            CipherInner::AesGcm(cipher) => cipher.encrypt(nonce, payload),
            CipherInner::ChaCha(cipher) => cipher.encrypt(nonce, payload),
        }
        .map_err(|_| VaultError::internal("AEAD encryption failed"))?;

        Ok((ciphertext, nonce_bytes.to_vec()))
    }

    /// Decrypt `ciphertext` produced by [`AeadCipher::encrypt`].
    ///
    /// Fails with the opaque [`VaultError::DecryptionFailed`] on any tag
    /// mismatch, truncation, or wrong key; never returns partial plaintext.
    /// The returned buffer zeroizes itself when dropped.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        if nonce.len() != NONCE_LEN {
            return Err(VaultError::DecryptionFailed);
        }
        let nonce = Nonce::from_slice(nonce);

        let payload = Payload {
            msg: ciphertext,
            aad: aad.unwrap_or_default(),
        };
        let plaintext = match &self.inner {
            CipherInner::AesGcm(cipher) => cipher.decrypt(nonce, payload),
            CipherInner::ChaCha(cipher) => cipher.decrypt(nonce, payload),
        }
        .map_err(|_| VaultError::DecryptionFailed)?;

        Ok(Zeroizing::new(plaintext))
    }
}

/// Generate a fresh random AEAD nonce from the OS CSPRNG.
#[must_use]
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Zero a byte buffer holding key material or plaintext.
///
/// This is the single release path for such buffers; scoped
/// [`Zeroizing`] guards call it implicitly on every exit path.
pub fn zero(buf: &mut [u8]) {
    buf.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_key() -> [u8; KEY_LEN] {
        [42u8; KEY_LEN]
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!(Algorithm::from_str("aes-gcm").unwrap(), Algorithm::AesGcm);
        assert_eq!(Algorithm::from_str("AES-GCM").unwrap(), Algorithm::AesGcm);
        assert_eq!(
            Algorithm::from_str("chacha20-poly1305").unwrap(),
            Algorithm::ChaCha20Poly1305
        );
        assert!(Algorithm::from_str("des").is_err());
    }

    #[test]
    fn test_rejects_short_key() {
        for algorithm in [Algorithm::AesGcm, Algorithm::ChaCha20Poly1305] {
            let result = AeadCipher::new(algorithm, &[0u8; 16]);
            assert!(matches!(result, Err(VaultError::InvalidKey(_))));
        }
    }

    #[test]
    fn test_roundtrip_both_algorithms() {
        for algorithm in [Algorithm::AesGcm, Algorithm::ChaCha20Poly1305] {
            let cipher = AeadCipher::new(algorithm, &test_key()).unwrap();
            let plaintext = b"4111111111111111";

            let (ciphertext, nonce) = cipher.encrypt(plaintext, None).unwrap();
            assert_ne!(ciphertext.as_slice(), plaintext.as_slice());
            assert_eq!(nonce.len(), NONCE_LEN);

            let decrypted = cipher.decrypt(&ciphertext, &nonce, None).unwrap();
            assert_eq!(decrypted.as_slice(), plaintext.as_slice());
        }
    }

    #[test]
    fn test_roundtrip_with_aad() {
        let cipher = AeadCipher::new(Algorithm::AesGcm, &test_key()).unwrap();
        let aad = b"token-id";

        let (ciphertext, nonce) = cipher.encrypt(b"secret", Some(aad)).unwrap();
        let decrypted = cipher.decrypt(&ciphertext, &nonce, Some(aad)).unwrap();
        assert_eq!(decrypted.as_slice(), b"secret");

        // Mismatched AAD must fail opaquely
        let result = cipher.decrypt(&ciphertext, &nonce, Some(b"other"));
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = AeadCipher::new(Algorithm::ChaCha20Poly1305, &test_key()).unwrap();
        let (mut ciphertext, nonce) = cipher.encrypt(b"secret", None).unwrap();
        ciphertext[0] ^= 0x01;

        let result = cipher.decrypt(&ciphertext, &nonce, None);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = AeadCipher::new(Algorithm::AesGcm, &test_key()).unwrap();
        let (ciphertext, nonce) = cipher.encrypt(b"secret", None).unwrap();

        let other = AeadCipher::new(Algorithm::AesGcm, &[7u8; KEY_LEN]).unwrap();
        let result = other.decrypt(&ciphertext, &nonce, None);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let cipher = AeadCipher::new(Algorithm::AesGcm, &test_key()).unwrap();
        let (ciphertext, nonce) = cipher.encrypt(b"secret", None).unwrap();

        let result = cipher.decrypt(&ciphertext[..ciphertext.len() - 1], &nonce, None);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));

        let result = cipher.decrypt(&ciphertext, &nonce[..NONCE_LEN - 1], None);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_nonce_uniqueness() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_nonce()));
        }
    }

    #[test]
    fn test_zero_clears_buffer() {
        let mut buf = vec![0xAAu8; 32];
        zero(&mut buf);
        assert!(buf.iter().all(|&b| b == 0));
    }
}
