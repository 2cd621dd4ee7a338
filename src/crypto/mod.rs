//! Cryptographic core: AEAD cipher suite, key manager, and key chains.

pub mod chain;
pub mod cipher;
pub mod keys;

pub use chain::{KekChain, MasterKey, MasterKeyChain, UnwrappedKek};
pub use cipher::{zero, AeadCipher, Algorithm, KEY_LEN, NONCE_LEN};
pub use keys::KeyManager;
