//! Prometheus metrics for Vault Service.
//!
//! Counters and histograms only; serving them over HTTP belongs to the
//! surrounding process wrapper.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

/// Tokens created counter.
pub static TOKENS_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vault_service_tokens_created_total",
        "Total number of tokens created",
        &["format", "deterministic"]
    )
    .expect("Failed to register tokens_created metric")
});

/// Detokenize outcomes counter.
pub static DETOKENIZE_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vault_service_detokenize_total",
        "Total number of detokenize attempts",
        &["status"]
    )
    .expect("Failed to register detokenize metric")
});

/// Tokens revoked counter.
pub static TOKENS_REVOKED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vault_service_tokens_revoked_total",
        "Total number of tokens revoked",
        &["status"]
    )
    .expect("Failed to register tokens_revoked metric")
});

/// Expired-token cleanup counter.
pub static CLEANUP_DELETED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vault_service_cleanup_deleted_total",
        "Total number of expired tokens removed by cleanup",
        &["dry_run"]
    )
    .expect("Failed to register cleanup_deleted metric")
});

/// Crypto operations counter.
pub static CRYPTO_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vault_service_crypto_operations_total",
        "Total number of AEAD operations",
        &["operation", "algorithm", "status"]
    )
    .expect("Failed to register crypto_operations metric")
});

/// Engine operation latency histogram.
pub static ENGINE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "vault_service_engine_latency_seconds",
        "Engine operation latency in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register engine_latency metric")
});

/// Record a token creation.
pub fn record_token_created(format: &str, deterministic: bool) {
    TOKENS_CREATED
        .with_label_values(&[format, if deterministic { "true" } else { "false" }])
        .inc();
}

/// Record a detokenize outcome.
pub fn record_detokenize(status: &str) {
    DETOKENIZE_REQUESTS.with_label_values(&[status]).inc();
}

/// Record a revocation outcome.
pub fn record_revoke(status: &str) {
    TOKENS_REVOKED.with_label_values(&[status]).inc();
}

/// Record a cleanup run.
pub fn record_cleanup(dry_run: bool, removed: u64) {
    CLEANUP_DELETED
        .with_label_values(&[if dry_run { "true" } else { "false" }])
        .inc_by(removed as f64);
}

/// Record an AEAD operation.
pub fn record_crypto_operation(operation: &str, algorithm: &str, status: &str) {
    CRYPTO_OPERATIONS
        .with_label_values(&[operation, algorithm, status])
        .inc();
}

/// Record engine operation latency.
pub fn record_engine_latency(operation: &str, duration_secs: f64) {
    ENGINE_LATENCY
        .with_label_values(&[operation])
        .observe(duration_secs);
}
