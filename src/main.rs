//! Vault Service - tokenization and secrets vault process bootstrap.
//!
//! Loads configuration, provisions the database schema, unwraps the key
//! hierarchy, and holds the process open until shutdown, at which point
//! all in-memory key material is zeroized.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use vault_service::config::Config;
use vault_service::crypto::chain::MasterKeyChain;
use vault_service::keys::TokenizationKeyService;
use vault_service::storage::{db, KekRepository};
use vault_service::tokenization::TokenizationEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let _guard = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .json()
        .try_init();

    info!("Starting Vault Service");

    let config = Config::from_env()?;

    let master_chain = MasterKeyChain::new(
        config.master_keys.clone(),
        &config.active_master_key_id,
    )?;
    info!(
        master_keys = master_chain.len(),
        active = %master_chain.active_id(),
        "Master key chain loaded"
    );

    let pool = db::connect(&config.db).await?;
    db::init_schema(&pool).await?;
    db::assert_deterministic_constraint(&pool).await?;

    let kek_chain = Arc::new(KekRepository.load_chain(&pool, &master_chain).await?);

    let engine = Arc::new(TokenizationEngine::new(
        pool.clone(),
        Arc::clone(&kek_chain),
        config.detokenize_deleted_keys,
    ));
    let key_service = Arc::new(TokenizationKeyService::new(
        pool.clone(),
        Arc::clone(&kek_chain),
    ));

    // Optional in-process sweep; production deployments drive cleanup
    // from an external scheduler instead.
    let sweep = if config.cleanup_interval_seconds > 0 {
        let engine = Arc::clone(&engine);
        let interval = Duration::from_secs(config.cleanup_interval_seconds);
        let retention_days = config.cleanup_retention_days;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match engine.cleanup_expired(retention_days, false).await {
                    Ok(removed) if removed > 0 => {
                        info!(removed, "Cleanup sweep removed expired tokens");
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "Cleanup sweep failed"),
                }
            }
        }))
    } else {
        None
    };

    info!("Vault Service ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Some(handle) = sweep {
        handle.abort();
    }
    pool.close().await;

    // Dropping the services releases the KEK chain, zeroizing every
    // unwrapped KEK; the master chain zeroizes with this scope.
    drop(engine);
    drop(key_service);
    drop(kek_chain);
    drop(master_chain);

    info!("Vault Service shutdown complete");
    Ok(())
}
