//! Common test utilities
//!
//! A `TestEnv` bundles the three injected dependencies every sync-core
//! test needs: a temp-file local database, an instrumented in-memory
//! gateway, and a hand-driven connectivity monitor.

#![allow(dead_code)]

use std::sync::Arc;

use bandbrain::collection::{CollectionOptions, SyncedCollection};
use bandbrain::local_db::LocalDatabase;
use bandbrain::remote::{MemoryGateway, RemoteGateway};
use bandbrain::shared::models::{NewBudgetItem, NewTask, SyncRecord};
use bandbrain::sync::{ConnectivityMonitor, SyncConfig, SyncManager};
use tempfile::TempDir;

pub struct TestEnv {
    // Held so the database directory outlives the test.
    _dir: TempDir,
    pub local: Arc<LocalDatabase>,
    pub gateway: MemoryGateway,
    pub connectivity: ConnectivityMonitor,
}

impl TestEnv {
    pub async fn online() -> Self {
        Self::with_online(true).await
    }

    pub async fn offline() -> Self {
        Self::with_online(false).await
    }

    async fn with_online(online: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let local = Arc::new(
            LocalDatabase::open(dir.path().join("cache.db"))
                .await
                .expect("open local database"),
        );
        Self {
            _dir: dir,
            local,
            gateway: MemoryGateway::new(),
            connectivity: ConnectivityMonitor::new(online),
        }
    }

    pub fn collection<T: SyncRecord>(&self, options: CollectionOptions) -> Arc<SyncedCollection<T>> {
        Arc::new(SyncedCollection::new(
            Arc::clone(&self.local),
            Arc::new(self.gateway.clone()) as Arc<dyn RemoteGateway>,
            self.connectivity.clone(),
            options,
        ))
    }

    pub fn manager(&self, config: SyncConfig) -> Arc<SyncManager> {
        Arc::new(SyncManager::new(
            Arc::clone(&self.local),
            Arc::new(self.gateway.clone()) as Arc<dyn RemoteGateway>,
            self.connectivity.clone(),
            config,
        ))
    }
}

pub fn new_task(band_id: &str, title: &str) -> NewTask {
    NewTask {
        band_id: band_id.to_string(),
        title: title.to_string(),
        assignee: String::new(),
        due_date: None,
    }
}

pub fn merch_sale(band_id: &str) -> NewBudgetItem {
    NewBudgetItem {
        band_id: band_id.to_string(),
        description: "Merch sale".to_string(),
        amount: 50.0,
        date: "2025-05-01".to_string(),
        category: String::new(),
        kind: bandbrain::shared::models::BudgetKind::Income,
    }
}
