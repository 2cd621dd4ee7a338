//! Centralized configuration for Vault Service.
//!
//! All configuration is loaded from environment variables and validated
//! at startup. Master key material is decoded here and handed straight to
//! the master-key chain; it never appears in logs or `Debug` output.

use crate::error::VaultError;
use base64::Engine as _;
use std::env;
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Expected byte length of a decoded master key.
pub const MASTER_KEY_LEN: usize = 32;

/// Database driver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDriver {
    /// PostgreSQL
    Postgres,
    /// MySQL
    Mysql,
}

impl DbDriver {
    /// Parse driver from string.
    pub fn from_str(s: &str) -> Result<Self, VaultError> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            _ => Err(VaultError::config(format!("Invalid DB_DRIVER: {}", s))),
        }
    }

    /// Get the driver name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }
}

/// One master key as supplied by the environment.
#[derive(Clone)]
pub struct MasterKeySpec {
    /// Stable textual identifier
    pub id: String,
    /// Decoded 32-byte key, zeroed when the spec is dropped
    pub key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for MasterKeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeySpec")
            .field("id", &self.id)
            .field("key", &"[redacted]")
            .finish()
    }
}

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Driver to use
    pub driver: DbDriver,
    /// Driver-native connection string
    pub connection_string: String,
    /// Maximum open connections in the pool
    pub max_open_conns: u32,
    /// Minimum idle connections held by the pool
    pub max_idle_conns: u32,
    /// Maximum lifetime of a pooled connection
    pub conn_max_lifetime: Duration,
}

/// Vault Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master keys loaded from the environment, insertion-ordered
    pub master_keys: Vec<MasterKeySpec>,
    /// ID of the master key designated active for wrapping
    pub active_master_key_id: String,
    /// Database settings
    pub db: DbConfig,
    /// Expiration applied to auth tokens by the surrounding auth layer
    pub auth_token_expiration: Duration,
    /// Whether detokenize resolves soft-deleted tokenization keys
    pub detokenize_deleted_keys: bool,
    /// Interval of the in-process expired-token sweep; 0 disables it
    pub cleanup_interval_seconds: u64,
    /// Retention window in days used by the in-process sweep
    pub cleanup_retention_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, VaultError> {
        dotenvy::dotenv().ok();

        let raw_keys = env::var("MASTER_KEYS")
            .map_err(|_| VaultError::config("MASTER_KEYS is required"))?;
        let master_keys = parse_master_keys(&raw_keys)?;

        let active_master_key_id = env::var("ACTIVE_MASTER_KEY_ID")
            .map_err(|_| VaultError::config("ACTIVE_MASTER_KEY_ID is required"))?;
        if !master_keys.iter().any(|k| k.id == active_master_key_id) {
            return Err(VaultError::config(format!(
                "ACTIVE_MASTER_KEY_ID '{}' is not present in MASTER_KEYS",
                active_master_key_id
            )));
        }

        let driver = DbDriver::from_str(
            &env::var("DB_DRIVER").unwrap_or_else(|_| "postgres".to_string()),
        )?;
        let connection_string = env::var("DB_CONNECTION_STRING")
            .map_err(|_| VaultError::config("DB_CONNECTION_STRING is required"))?;

        let db = DbConfig {
            driver,
            connection_string,
            max_open_conns: parse_env("DB_MAX_OPEN_CONNS", 25)?,
            max_idle_conns: parse_env("DB_MAX_IDLE_CONNS", 5)?,
            conn_max_lifetime: Duration::from_secs(parse_env(
                "DB_CONN_MAX_LIFETIME_SECONDS",
                300,
            )?),
        };

        let auth_token_expiration =
            Duration::from_secs(parse_env("AUTH_TOKEN_EXPIRATION_SECONDS", 3600)?);

        let detokenize_deleted_keys = parse_env("DETOKENIZE_DELETED_KEYS", false)?;
        let cleanup_interval_seconds = parse_env("CLEANUP_INTERVAL_SECONDS", 0)?;
        let cleanup_retention_days = parse_env("CLEANUP_RETENTION_DAYS", 30)?;
        if cleanup_retention_days < 0 {
            return Err(VaultError::config(
                "CLEANUP_RETENTION_DAYS must not be negative",
            ));
        }

        Ok(Self {
            master_keys,
            active_master_key_id,
            db,
            auth_token_expiration,
            detokenize_deleted_keys,
            cleanup_interval_seconds,
            cleanup_retention_days,
        })
    }
}

/// Parse the `MASTER_KEYS` value: `id1:b64key1,id2:b64key2,…`.
///
/// Each decoded key must be exactly [`MASTER_KEY_LEN`] bytes and each ID
/// must be unique.
pub fn parse_master_keys(raw: &str) -> Result<Vec<MasterKeySpec>, VaultError> {
    let mut specs: Vec<MasterKeySpec> = Vec::new();

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (id, encoded) = entry.split_once(':').ok_or_else(|| {
            VaultError::config(format!("MASTER_KEYS entry '{}' is not id:base64", entry))
        })?;
        if id.is_empty() {
            return Err(VaultError::config("MASTER_KEYS entry has an empty ID"));
        }
        if specs.iter().any(|s| s.id == id) {
            return Err(VaultError::config(format!(
                "MASTER_KEYS contains duplicate ID '{}'",
                id
            )));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| {
                VaultError::config(format!("MASTER_KEYS key '{}' is not valid base64: {}", id, e))
            })?;
        if bytes.len() != MASTER_KEY_LEN {
            return Err(VaultError::config(format!(
                "master key '{}' must decode to {} bytes, got {}",
                id,
                MASTER_KEY_LEN,
                bytes.len()
            )));
        }

        specs.push(MasterKeySpec {
            id: id.to_string(),
            key: Zeroizing::new(bytes),
        });
    }

    if specs.is_empty() {
        return Err(VaultError::config("MASTER_KEYS contains no keys"));
    }

    Ok(specs)
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, VaultError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| VaultError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn b64_key(byte: u8) -> String {
        base64::engine::general_purpose::STANDARD.encode([byte; 32])
    }

    #[test]
    fn test_db_driver_parsing() {
        assert_eq!(DbDriver::from_str("postgres").unwrap(), DbDriver::Postgres);
        assert_eq!(DbDriver::from_str("POSTGRES").unwrap(), DbDriver::Postgres);
        assert_eq!(DbDriver::from_str("mysql").unwrap(), DbDriver::Mysql);
        assert!(DbDriver::from_str("sqlite").is_err());
    }

    #[test]
    fn test_parse_master_keys() {
        let raw = format!("mk1:{},mk2:{}", b64_key(1), b64_key(2));
        let specs = parse_master_keys(&raw).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].id, "mk1");
        assert_eq!(specs[1].id, "mk2");
        assert_eq!(specs[0].key.as_slice(), &[1u8; 32]);
    }

    #[test]
    fn test_parse_master_keys_rejects_short_key() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let raw = format!("mk1:{}", short);
        assert!(parse_master_keys(&raw).is_err());
    }

    #[test]
    fn test_parse_master_keys_rejects_duplicates() {
        let raw = format!("mk1:{},mk1:{}", b64_key(1), b64_key(2));
        assert!(parse_master_keys(&raw).is_err());
    }

    #[test]
    fn test_parse_master_keys_rejects_bad_entries() {
        assert!(parse_master_keys("").is_err());
        assert!(parse_master_keys("no-separator").is_err());
        assert!(parse_master_keys(&format!(":{}", b64_key(1))).is_err());
        assert!(parse_master_keys("mk1:not-base64!!").is_err());
    }

    #[test]
    fn test_master_key_spec_debug_is_redacted() {
        let spec = MasterKeySpec {
            id: "mk1".to_string(),
            key: Zeroizing::new(vec![7u8; 32]),
        };
        let rendered = format!("{:?}", spec);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains('7'));
    }
}
