//! Pool construction, schema initialization, and startup assertions.

use crate::config::{DbConfig, DbDriver};
use crate::error::VaultError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Name of the partial unique index that makes deterministic tokenization
/// race-safe. Its presence is asserted at startup.
pub const DETERMINISTIC_CONSTRAINT: &str = "uq_tokens_key_value_hash";

/// Connect a pool using the configured driver and sizing knobs.
pub async fn connect(cfg: &DbConfig) -> Result<PgPool, VaultError> {
    match cfg.driver {
        DbDriver::Postgres => {}
        DbDriver::Mysql => {
            return Err(VaultError::config(
                "DB_DRIVER=mysql is not wired in this build; only the postgres dialect is supported",
            ));
        }
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_open_conns)
        .min_connections(cfg.max_idle_conns)
        .max_lifetime(cfg.conn_max_lifetime)
        .connect(&cfg.connection_string)
        .await
        .map_err(VaultError::from_db)?;

    // Probe the connection before serving
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(VaultError::from_db)?;

    Ok(pool)
}

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS kek (
        id UUID PRIMARY KEY,
        master_key_id TEXT NOT NULL,
        algorithm TEXT NOT NULL,
        encrypted_key BYTEA NOT NULL,
        nonce BYTEA NOT NULL,
        version INTEGER NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_kek_version ON kek (version DESC)"#,
    r#"
    CREATE TABLE IF NOT EXISTS dek (
        id UUID PRIMARY KEY,
        kek_id UUID NOT NULL REFERENCES kek(id),
        algorithm TEXT NOT NULL,
        encrypted_key BYTEA NOT NULL,
        nonce BYTEA NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokenization_keys (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        version INTEGER NOT NULL,
        format_type TEXT NOT NULL,
        is_deterministic BOOLEAN NOT NULL,
        dek_id UUID NOT NULL REFERENCES dek(id),
        created_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ,
        CONSTRAINT uq_tokenization_keys_name_version UNIQUE (name, version)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tokenization_keys_name_version
        ON tokenization_keys (name, version DESC) WHERE deleted_at IS NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokenization_tokens (
        id UUID PRIMARY KEY,
        tokenization_key_id UUID NOT NULL REFERENCES tokenization_keys(id),
        token TEXT NOT NULL UNIQUE,
        value_hash TEXT,
        ciphertext BYTEA NOT NULL,
        nonce BYTEA NOT NULL,
        metadata JSONB,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ,
        revoked_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uq_tokens_key_value_hash
        ON tokenization_tokens (tokenization_key_id, value_hash)
        WHERE value_hash IS NOT NULL
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_tokens_expires_at ON tokenization_tokens (expires_at)"#,
];

/// Create the vault tables and indexes if they do not exist.
///
/// Index creation runs as separate statements; PostgreSQL rejects multiple
/// statements in one prepared query.
pub async fn init_schema(pool: &PgPool) -> Result<(), VaultError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(VaultError::from_db)?;
    }
    info!("Vault schema initialized");
    Ok(())
}

/// Assert that the deterministic uniqueness constraint exists.
///
/// The deterministic double-insert recovery depends on the database
/// enforcing uniqueness of `(tokenization_key_id, value_hash)`; without it
/// the design degrades silently, so the process refuses to start.
pub async fn assert_deterministic_constraint(pool: &PgPool) -> Result<(), VaultError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT 1 FROM pg_indexes
            WHERE tablename = 'tokenization_tokens' AND indexname = $1
        )",
    )
    .bind(DETERMINISTIC_CONSTRAINT)
    .fetch_one(pool)
    .await
    .map_err(VaultError::from_db)?;

    if !exists {
        return Err(VaultError::config(format!(
            "required unique index '{}' is missing on tokenization_tokens",
            DETERMINISTIC_CONSTRAINT
        )));
    }
    Ok(())
}
