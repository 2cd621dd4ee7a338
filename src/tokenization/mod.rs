//! Tokenization engine and token-format generators.

pub mod engine;
pub mod generator;

pub use engine::{expires_at_from_ttl, Detokenized, TokenizationEngine, MAX_PLAINTEXT_BYTES};
pub use generator::{TokenFormat, MAX_TOKEN_LEN, MIN_TOKEN_LEN};
