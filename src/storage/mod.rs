//! Persistence layer: pool construction, schema, and typed repositories.
//!
//! Repository methods take `impl PgExecutor<'_>` so the same query code
//! runs against the shared pool or an open transaction; multi-statement
//! invariants compose repository calls inside one `begin()`/`commit()`
//! scope.

pub mod db;
pub mod keys;
pub mod models;
pub mod tokenization_keys;
pub mod tokens;

pub use keys::{DekRepository, KekRepository};
pub use tokenization_keys::TokenizationKeyRepository;
pub use tokens::TokenRepository;
