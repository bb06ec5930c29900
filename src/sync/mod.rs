//! # Sync Manager
//!
//! Drains the pending-operations queue into the remote data gateway.
//!
//! ## Triggers
//!
//! - a fixed interval while online,
//! - the offline-to-online transition edge,
//! - an explicit [`SyncManager::force_sync`] from a user action.
//!
//! ## Pass semantics
//!
//! A pass is single-flight: an atomic flag admits one pass at a time and
//! triggers arriving mid-pass are dropped, not queued. The pass reads a
//! FIFO snapshot of the queue and replays entries in order. A failed
//! entry is logged and left in place for a later pass while the loop
//! moves on, so one stuck operation cannot block the rest; order among
//! surviving entries is preserved. Every replay runs under a bounded
//! timeout so a hung remote call cannot wedge the syncing flag forever.
//! An empty queue is a successful no-op.

pub mod connectivity;
pub mod state;

pub use connectivity::ConnectivityMonitor;
pub use state::{SyncOutcome, SyncReport, SyncStatus};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::local_db::queue::{OperationKind, OperationPayload, PendingOperation};
use crate::local_db::LocalDatabase;
use crate::remote::RemoteGateway;
use crate::shared::error::{RemoteError, SyncError};
use crate::shared::json::field;

/// Sync manager tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between background passes
    pub interval: Duration,
    /// Bound on a single replayed remote call
    pub operation_timeout: Duration,
    /// Run a pass immediately when the background task starts online
    pub sync_on_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(10),
            sync_on_start: true,
        }
    }
}

/// Replays queued offline writes against the remote store.
///
/// Explicitly constructed and shared by `Arc`; nothing here is global.
pub struct SyncManager {
    local: Arc<LocalDatabase>,
    gateway: Arc<dyn RemoteGateway>,
    connectivity: ConnectivityMonitor,
    config: SyncConfig,
    syncing: AtomicBool,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl SyncManager {
    pub fn new(
        local: Arc<LocalDatabase>,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            gateway,
            connectivity,
            config,
            syncing: AtomicBool::new(false),
            last_sync: RwLock::new(None),
        }
    }

    /// Start the background task: periodic passes plus a pass on every
    /// offline-to-online edge. Abort the handle to stop it.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + manager.config.interval;
            let mut ticker = tokio::time::interval_at(start, manager.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut online_rx = manager.connectivity.watch();

            if manager.config.sync_on_start && manager.connectivity.is_online() {
                manager.run_logged().await;
            }

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.connectivity.is_online() {
                            manager.run_logged().await;
                        }
                    }
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *online_rx.borrow_and_update() {
                            tracing::info!("back online, draining pending operations");
                            manager.run_logged().await;
                        }
                    }
                }
            }
        })
    }

    /// On-demand sync from a user action. Rejected immediately while
    /// offline instead of being attempted.
    pub async fn force_sync(&self) -> Result<SyncOutcome, SyncError> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }
        self.sync().await
    }

    /// Run one pass, unless a pass is already in flight.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(SyncOutcome::AlreadyRunning);
        }

        let result = self.drain_queue().await;
        self.syncing.store(false, Ordering::SeqCst);
        result.map(SyncOutcome::Completed)
    }

    /// Snapshot of the current sync state.
    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let pending = self.local.pending_count().await.map_err(SyncError::Local)?;
        Ok(SyncStatus {
            is_online: self.connectivity.is_online(),
            is_syncing: self.syncing.load(Ordering::SeqCst),
            last_sync_time: *self.last_sync.read().expect("last_sync poisoned"),
            pending_operations: pending,
        })
    }

    async fn run_logged(&self) {
        match self.sync().await {
            Ok(SyncOutcome::Completed(report)) if report.synced + report.failed > 0 => {
                tracing::info!(synced = report.synced, failed = report.failed, "sync pass finished");
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "sync pass aborted"),
        }
    }

    async fn drain_queue(&self) -> Result<SyncReport, SyncError> {
        let snapshot = self.local.pending_operations().await.map_err(SyncError::Local)?;
        let mut report = SyncReport::default();

        for op in snapshot {
            match tokio::time::timeout(self.config.operation_timeout, self.replay(&op)).await {
                Ok(Ok(())) => {
                    self.local.dequeue(op.seq).await.map_err(SyncError::Local)?;
                    report.synced += 1;
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        seq = op.seq,
                        table = %op.table,
                        kind = ?op.kind,
                        error = %err,
                        "pending operation failed, leaving it queued"
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        seq = op.seq,
                        table = %op.table,
                        timeout = ?self.config.operation_timeout,
                        "pending operation timed out, leaving it queued"
                    );
                    report.failed += 1;
                }
            }
        }

        *self.last_sync.write().expect("last_sync poisoned") = Some(Utc::now());
        Ok(report)
    }

    /// Replay one queue entry against the gateway.
    async fn replay(&self, op: &PendingOperation) -> Result<(), RemoteError> {
        match (&op.kind, &op.payload) {
            (OperationKind::Insert, OperationPayload::Record(record)) => {
                self.gateway.insert(&op.table, record).await.map(|_| ())
            }
            (OperationKind::Update, OperationPayload::Record(record)) => {
                let Some(id) = field(record, "id").as_str() else {
                    return Err(RemoteError::Payload(
                        "queued update carries no id".into(),
                    ));
                };
                self.gateway.update(&op.table, id, record).await
            }
            (OperationKind::Delete, OperationPayload::Id(id)) => {
                self.gateway.delete(&op.table, id).await
            }
            (kind, payload) => Err(RemoteError::Payload(format!(
                "queued {kind:?} carries mismatched payload {payload:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_db::queue::NewPendingOperation;
    use crate::local_db::test_db;
    use crate::remote::MemoryGateway;
    use serde_json::json;

    fn manager(
        local: Arc<LocalDatabase>,
        gateway: &MemoryGateway,
        online: bool,
    ) -> Arc<SyncManager> {
        Arc::new(SyncManager::new(
            local,
            Arc::new(gateway.clone()),
            ConnectivityMonitor::new(online),
            SyncConfig::default(),
        ))
    }

    #[tokio::test]
    async fn empty_queue_is_a_noop_success() {
        let (_dir, db) = test_db().await;
        let gateway = MemoryGateway::new();
        let manager = manager(Arc::new(db), &gateway, true);

        let outcome = manager.force_sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed(SyncReport::default()));
        assert!(manager.status().await.unwrap().last_sync_time.is_some());
    }

    #[tokio::test]
    async fn force_sync_offline_is_rejected() {
        let (_dir, db) = test_db().await;
        let gateway = MemoryGateway::new();
        let manager = manager(Arc::new(db), &gateway, false);

        let err = manager.force_sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Offline));
        assert_eq!(gateway.call_log().len(), 0);
    }

    #[tokio::test]
    async fn pass_replays_fifo_and_dequeues() {
        let (_dir, db) = test_db().await;
        let db = Arc::new(db);
        let record = json!({"id": "t1", "band_id": "b", "title": "x"});
        let updated = json!({"id": "t1", "band_id": "b", "title": "y"});

        db.enqueue(NewPendingOperation::insert("tasks", record))
            .await
            .unwrap();
        db.enqueue(NewPendingOperation::update("tasks", updated))
            .await
            .unwrap();
        db.enqueue(NewPendingOperation::delete("tasks", "t1"))
            .await
            .unwrap();

        let gateway = MemoryGateway::new();
        let manager = manager(Arc::clone(&db), &gateway, true);
        let report = manager.sync().await.unwrap().report().unwrap();

        assert_eq!(report, SyncReport { synced: 3, failed: 0 });
        assert_eq!(db.pending_count().await.unwrap(), 0);

        let methods: Vec<&str> = gateway.call_log().iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["insert", "update", "delete"]);
        assert!(gateway.table("tasks").await.is_empty());
    }

    #[tokio::test]
    async fn failed_entry_stays_queued_without_blocking_later_ones() {
        let (_dir, db) = test_db().await;
        let db = Arc::new(db);
        db.enqueue(NewPendingOperation::insert(
            "tasks",
            json!({"id": "t1", "band_id": "b"}),
        ))
        .await
        .unwrap();
        db.enqueue(NewPendingOperation::insert(
            "notes",
            json!({"id": "n1", "band_id": "b"}),
        ))
        .await
        .unwrap();

        let gateway = MemoryGateway::new();
        gateway.set_failing("tasks", true);
        let manager = manager(Arc::clone(&db), &gateway, true);

        let report = manager.sync().await.unwrap().report().unwrap();
        assert_eq!(report, SyncReport { synced: 1, failed: 1 });

        let remaining = db.pending_operations().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].table, "tasks");
        assert_eq!(gateway.table("notes").await.len(), 1);

        // Next pass picks the stuck entry up again.
        gateway.set_failing("tasks", false);
        let report = manager.sync().await.unwrap().report().unwrap();
        assert_eq!(report, SyncReport { synced: 1, failed: 0 });
        assert_eq!(db.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_syncs_run_a_single_pass() {
        let (_dir, db) = test_db().await;
        let db = Arc::new(db);
        db.enqueue(NewPendingOperation::insert(
            "tasks",
            json!({"id": "t1", "band_id": "b"}),
        ))
        .await
        .unwrap();

        let gateway = MemoryGateway::new();
        gateway.set_latency(Duration::from_millis(100));
        let manager = manager(Arc::clone(&db), &gateway, true);

        let (first, second) = tokio::join!(manager.force_sync(), manager.force_sync());
        let outcomes = [first.unwrap(), second.unwrap()];

        assert!(outcomes.contains(&SyncOutcome::AlreadyRunning));
        assert_eq!(gateway.calls("insert"), 1);
        assert_eq!(db.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn spawned_manager_drains_on_reconnect() {
        let (_dir, db) = test_db().await;
        let db = Arc::new(db);
        db.enqueue(NewPendingOperation::insert(
            "tasks",
            json!({"id": "t1", "band_id": "b"}),
        ))
        .await
        .unwrap();

        let gateway = MemoryGateway::new();
        let connectivity = ConnectivityMonitor::new(false);
        let manager = Arc::new(SyncManager::new(
            Arc::clone(&db),
            Arc::new(gateway.clone()),
            connectivity.clone(),
            SyncConfig {
                interval: Duration::from_secs(3600),
                ..SyncConfig::default()
            },
        ));
        let task = manager.spawn();

        connectivity.set_online(true);

        // Wait for the edge-triggered pass to drain the queue.
        for _ in 0..50 {
            if db.pending_count().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(db.pending_count().await.unwrap(), 0);
        assert_eq!(gateway.table("tasks").await.len(), 1);

        task.abort();
    }
}
