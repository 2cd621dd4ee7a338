//! Centralized error handling for Vault Service.
//!
//! Every error carries a contextual message for operator logs while the
//! externalized [`ErrorKind`] stays stable for transport mapping.

use thiserror::Error;
use uuid::Uuid;

/// Stable error classification exposed to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Token, key, DEK, or KEK absent
    NotFound,
    /// Unique collision (name+version, token string, value hash)
    Conflict,
    /// Format, length, empty/oversized plaintext, bad TTL, bad UUID
    InvalidInput,
    /// Missing or invalid credentials (surrounding layer)
    Unauthorized,
    /// Capability missing (surrounding layer)
    Forbidden,
    /// Client locked out (surrounding layer)
    Locked,
    /// Any AEAD failure, surfaced opaquely
    DecryptionFailed,
    /// Anything else; never leaks stage detail to clients
    Internal,
}

impl ErrorKind {
    /// HTTP status code this kind maps to at the transport boundary.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InvalidInput => 422,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Locked => 423,
            Self::DecryptionFailed | Self::Internal => 500,
        }
    }

    /// Stable string identifier for logs and externalized payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidInput => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Locked => "locked",
            Self::DecryptionFailed => "decryption_failed",
            Self::Internal => "internal",
        }
    }
}

/// Vault Service error types.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Tokenize called with an empty plaintext
    #[error("plaintext is empty")]
    PlaintextEmpty,

    /// Tokenize called with a plaintext above the size limit
    #[error("plaintext of {0} bytes exceeds the maximum size")]
    PlaintextTooLarge(usize),

    /// Token string has no record
    #[error("token not found")]
    TokenNotFound,

    /// Token exists but its expiry has passed
    #[error("token has expired")]
    TokenExpired,

    /// Token exists but has been revoked
    #[error("token has been revoked")]
    TokenRevoked,

    /// No usable tokenization key for the given name or id
    #[error("tokenization key not found: {0}")]
    TokenizationKeyNotFound(String),

    /// Tokenization key version already present
    #[error("tokenization key already exists: {0}")]
    AlreadyExists(String),

    /// DEK references a KEK missing from the loaded chain
    #[error("KEK not found: {0}")]
    KekNotFound(Uuid),

    /// Tokenization key references a DEK with no row
    #[error("DEK not found: {0}")]
    DekNotFound(Uuid),

    /// KEK references a master key missing from the chain
    #[error("master key not found: {0}")]
    MasterKeyNotFound(String),

    /// Wrapping key material has the wrong shape
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Validation failure on caller-supplied input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unique constraint collision reported by the database
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials (surrounding layer)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Capability missing (surrounding layer)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Client locked out (surrounding layer)
    #[error("client locked: {0}")]
    Locked(String),

    /// Any AEAD failure. Deliberately carries no stage detail.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Configuration error detected at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Database error other than a unique violation
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Classify this error into its stable externalized kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenNotFound
            | Self::TokenExpired
            | Self::TokenRevoked
            | Self::TokenizationKeyNotFound(_)
            | Self::KekNotFound(_)
            | Self::DekNotFound(_)
            | Self::MasterKeyNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) | Self::Conflict(_) => ErrorKind::Conflict,
            Self::PlaintextEmpty
            | Self::PlaintextTooLarge(_)
            | Self::InvalidKey(_)
            | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Locked(_) => ErrorKind::Locked,
            Self::DecryptionFailed => ErrorKind::DecryptionFailed,
            Self::Config(_) | Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check whether this error is a unique-collision conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }

    /// Map a database error, folding unique violations into [`VaultError::Conflict`].
    #[must_use]
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return Self::Conflict(db.message().to_string());
            }
        }
        Self::Database(err)
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid-key error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_db(err)
    }
}
