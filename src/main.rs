//! BandBrain daemon entry point.
//!
//! Wires the sync core together from configuration: local cache, remote
//! gateway, connectivity probe, sync manager, and one synchronized
//! collection per entity type. Runs until interrupted, logging sync
//! status transitions along the way.

use std::sync::Arc;
use std::time::Duration;

use bandbrain::collection::CollectionOptions;
use bandbrain::collections::BandCollections;
use bandbrain::local_db::LocalDatabase;
use bandbrain::remote::{PostgrestGateway, RemoteGateway};
use bandbrain::shared::config::AppConfig;
use bandbrain::sync::{ConnectivityMonitor, SyncConfig, SyncManager};

/// How often the daemon logs a status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    // Configuration file takes effect only when present; the environment
    // always works. Missing endpoint or key aborts startup here.
    let config = if std::path::Path::new("bandbrain.toml").exists() {
        AppConfig::from_file("bandbrain.toml")?
    } else {
        AppConfig::from_env()?
    };
    tracing::info!(remote = %config.remote_url, "starting bandbrain");

    let local = Arc::new(match &config.database_path {
        Some(path) => LocalDatabase::open(path).await?,
        None => LocalDatabase::open_default().await?,
    });

    let gateway: Arc<dyn RemoteGateway> = Arc::new(PostgrestGateway::new(&config));

    let connectivity = ConnectivityMonitor::new(false);
    let probe = connectivity.spawn_probe(Arc::clone(&gateway), config.poll_interval);

    let manager = Arc::new(SyncManager::new(
        Arc::clone(&local),
        Arc::clone(&gateway),
        connectivity.clone(),
        SyncConfig {
            interval: config.sync_interval,
            operation_timeout: config.operation_timeout,
            sync_on_start: true,
        },
    ));
    let sync_task = manager.spawn();

    let collections = config.band_id.clone().map(|band_id| {
        BandCollections::new(
            Arc::clone(&local),
            Arc::clone(&gateway),
            connectivity.clone(),
            band_id,
            CollectionOptions::default().operation_timeout(config.operation_timeout),
        )
    });

    if let Some(collections) = &collections {
        if let Err(err) = collections.refresh_all().await {
            tracing::warn!(error = %err, "initial refresh failed");
        }
    } else {
        tracing::warn!("no band_id configured, running queue replay only");
    }

    let mut status_ticker = tokio::time::interval(STATUS_INTERVAL);
    status_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = status_ticker.tick() => {
                match manager.status().await {
                    Ok(status) => tracing::info!(
                        online = status.is_online,
                        syncing = status.is_syncing,
                        pending = status.pending_operations,
                        last_sync = ?status.last_sync_time,
                        "sync status"
                    ),
                    Err(err) => tracing::error!(error = %err, "status check failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    sync_task.abort();
    probe.abort();
    Ok(())
}
