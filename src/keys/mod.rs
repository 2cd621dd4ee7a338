//! Tokenization key management.

pub mod service;

pub use service::TokenizationKeyService;
