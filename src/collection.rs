//! # Synchronized Collection
//!
//! The per-entity-type CRUD facade every feature surface consumes. It
//! composes the local cache store, the remote data gateway, and the
//! connectivity monitor behind one contract: `data`, `loading`, `error`,
//! `add`, `update`, `remove`, `refresh`.
//!
//! ## Write paths
//!
//! When the monitor reports online, writes go to the remote store first
//! and are mirrored into the local cache on success. When the monitor
//! reports offline, or the remote call fails or times out, the write
//! lands in the local cache and a pending operation is enqueued for the
//! sync manager to replay later. Remote failures never reach the caller
//! as errors; the collection silently degrades to the offline path.
//! Local-store failures do propagate, because there is nothing left to
//! fall back to.
//!
//! ## Reads
//!
//! `refresh` treats the remote store as the source of truth while
//! reachable: returned rows are validated, written through to the cache,
//! and replace the in-memory view entirely. Offline (or on remote
//! failure) the view is rebuilt from the cache with the same band scope,
//! equality filters, and ordering applied in-process; the sort is stable,
//! so ties keep their storage order.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::local_db::queue::NewPendingOperation;
use crate::local_db::LocalDatabase;
use crate::remote::{OrderBy, QueryOptions, RemoteGateway};
use crate::shared::error::LocalStoreError;
use crate::shared::json::{cmp_values, field, merge_fields};
use crate::shared::models::SyncRecord;
use crate::sync::ConnectivityMonitor;

/// Result type for collection operations
pub type Result<T> = std::result::Result<T, LocalStoreError>;

/// Per-collection settings: band scope, extra equality filters, ordering,
/// and the bound on a single remote call.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub band_id: Option<String>,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
    pub operation_timeout: Duration,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            band_id: None,
            filters: Vec::new(),
            order_by: None,
            operation_timeout: Duration::from_secs(10),
        }
    }
}

impl CollectionOptions {
    pub fn band(mut self, band_id: impl Into<String>) -> Self {
        self.band_id = Some(band_id.into());
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push((column.into(), value));
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// The in-memory view handed to feature surfaces.
#[derive(Debug)]
struct ViewState<T> {
    data: Vec<T>,
    loading: bool,
    error: Option<String>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// One entity type's synchronized CRUD facade.
pub struct SyncedCollection<T: SyncRecord> {
    local: Arc<LocalDatabase>,
    gateway: Arc<dyn RemoteGateway>,
    connectivity: ConnectivityMonitor,
    options: CollectionOptions,
    state: RwLock<ViewState<T>>,
    realtime: Mutex<Option<JoinHandle<()>>>,
}

impl<T: SyncRecord> SyncedCollection<T> {
    pub fn new(
        local: Arc<LocalDatabase>,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: ConnectivityMonitor,
        options: CollectionOptions,
    ) -> Self {
        Self {
            local,
            gateway,
            connectivity,
            options,
            state: RwLock::new(ViewState::default()),
            realtime: Mutex::new(None),
        }
    }

    /// Last-loaded records. Never triggers I/O.
    pub fn data(&self) -> Vec<T> {
        self.state.read().expect("view state poisoned").data.clone()
    }

    /// One record from the last-loaded view.
    pub fn find(&self, id: &str) -> Option<T> {
        self.state
            .read()
            .expect("view state poisoned")
            .data
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Whether a refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.state.read().expect("view state poisoned").loading
    }

    /// Last load failure, if the view could not be rebuilt at all.
    pub fn error(&self) -> Option<String> {
        self.state.read().expect("view state poisoned").error.clone()
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            band_id: self.options.band_id.clone(),
            filters: self.options.filters.clone(),
            order_by: self.options.order_by.clone(),
        }
    }

    /// Rebuild the in-memory view.
    ///
    /// Online: query the remote store, write every returned row through to
    /// the cache, and replace the view with exactly what came back. On
    /// remote failure, or offline, fall back to the cache.
    pub async fn refresh(&self) -> Result<()> {
        self.set_loading(true);

        let loaded = if self.connectivity.is_online() {
            let query_options = self.query_options();
            let query = self.gateway.query(T::TABLE, &query_options);
            match tokio::time::timeout(self.options.operation_timeout, query).await {
                Ok(Ok(rows)) => self.ingest_remote(rows).await,
                Ok(Err(err)) => {
                    tracing::warn!(table = T::TABLE, error = %err, "remote query failed, reading cache");
                    self.load_cached().await
                }
                Err(_) => {
                    tracing::warn!(table = T::TABLE, "remote query timed out, reading cache");
                    self.load_cached().await
                }
            }
        } else {
            self.load_cached().await
        };

        let mut state = self.state.write().expect("view state poisoned");
        state.loading = false;
        match loaded {
            Ok(data) => {
                state.data = data;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                // Both stores failed; keep showing the stale view.
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Create a record. The id is generated here, client-side, so the
    /// record is addressable before any sync happens. The caller cannot
    /// tell from the return value whether the insert reached the remote
    /// store or was queued.
    pub async fn add(&self, new: T::New) -> Result<T> {
        let record = T::from_new(Uuid::new_v4().to_string(), new);
        let value = serde_json::to_value(&record).map_err(LocalStoreError::Encode)?;

        if self.connectivity.is_online() {
            let insert = self.gateway.insert(T::TABLE, &value);
            match tokio::time::timeout(self.options.operation_timeout, insert).await {
                Ok(Ok(stored)) => {
                    // Prefer the stored row: it may carry server defaults.
                    match serde_json::from_value::<T>(stored.clone()) {
                        Ok(server_record) => {
                            self.local.save(T::TABLE, &stored).await?;
                            self.push_view(server_record.clone());
                            return Ok(server_record);
                        }
                        Err(err) => {
                            tracing::warn!(table = T::TABLE, error = %err, "stored row failed validation, keeping local copy");
                            self.local.save(T::TABLE, &value).await?;
                            self.push_view(record.clone());
                            return Ok(record);
                        }
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(table = T::TABLE, error = %err, "remote insert failed, queueing");
                }
                Err(_) => {
                    tracing::warn!(table = T::TABLE, "remote insert timed out, queueing");
                }
            }
        }

        self.local.save(T::TABLE, &value).await?;
        self.local
            .enqueue(NewPendingOperation::insert(T::TABLE, value))
            .await?;
        self.push_view(record.clone());
        Ok(record)
    }

    /// Apply a partial update. The cache always receives the full merged
    /// record; when the write has to be queued, the pending operation also
    /// carries the full merged record rather than the patch.
    pub async fn update(&self, id: &str, patch: T::Patch) -> Result<()> {
        let fields = serde_json::to_value(&patch).map_err(LocalStoreError::Encode)?;

        if self.connectivity.is_online() {
            let update = self.gateway.update(T::TABLE, id, &fields);
            match tokio::time::timeout(self.options.operation_timeout, update).await {
                Ok(Ok(())) => return self.merge_cached(id, &fields, false).await,
                Ok(Err(err)) => {
                    tracing::warn!(table = T::TABLE, id, error = %err, "remote update failed, queueing");
                }
                Err(_) => {
                    tracing::warn!(table = T::TABLE, id, "remote update timed out, queueing");
                }
            }
        }

        self.merge_cached(id, &fields, true).await
    }

    /// Delete a record. Always removed from the cache and the view; the
    /// remote delete is queued as a bare id when it cannot happen now.
    pub async fn remove(&self, id: &str) -> Result<()> {
        if self.connectivity.is_online() {
            let delete = self.gateway.delete(T::TABLE, id);
            match tokio::time::timeout(self.options.operation_timeout, delete).await {
                Ok(Ok(())) => {
                    self.local.remove(T::TABLE, id).await?;
                    self.drop_view(id);
                    return Ok(());
                }
                Ok(Err(err)) => {
                    tracing::warn!(table = T::TABLE, id, error = %err, "remote delete failed, queueing");
                }
                Err(_) => {
                    tracing::warn!(table = T::TABLE, id, "remote delete timed out, queueing");
                }
            }
        }

        self.local.remove(T::TABLE, id).await?;
        self.local
            .enqueue(NewPendingOperation::delete(T::TABLE, id))
            .await?;
        self.drop_view(id);
        Ok(())
    }

    /// Start refreshing on gateway change notices.
    ///
    /// The task holds only a weak reference, re-subscribes on every
    /// connectivity edge, and is aborted when the collection drops, so a
    /// discarded collection leaves no subscription behind. Does nothing
    /// without a band scope.
    pub fn start_realtime(self: &Arc<Self>) {
        let Some(band_id) = self.options.band_id.clone() else {
            return;
        };

        let weak = Arc::downgrade(self);
        let gateway = Arc::clone(&self.gateway);
        let mut online_rx = self.connectivity.watch();

        let task = tokio::spawn(async move {
            let mut feed = None;
            loop {
                let online = *online_rx.borrow_and_update();
                if online && feed.is_none() {
                    feed = Some(gateway.subscribe(T::TABLE, &band_id));
                } else if !online {
                    feed = None;
                }

                tokio::select! {
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    notice = next_notice(&mut feed) => {
                        match notice {
                            Some(_) => {
                                let Some(collection) = weak.upgrade() else { break };
                                if let Err(err) = collection.refresh().await {
                                    tracing::warn!(table = T::TABLE, error = %err, "refresh on change notice failed");
                                }
                            }
                            None => {
                                // Feed closed; re-subscribe on the next turn.
                                feed = None;
                                tokio::time::sleep(Duration::from_millis(200)).await;
                            }
                        }
                    }
                }

                if weak.strong_count() == 0 {
                    break;
                }
            }
        });

        let mut slot = self.realtime.lock().expect("realtime slot poisoned");
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Validate remote rows, write them through the cache, and produce the
    /// new view. Malformed rows are dropped before they can be cached.
    async fn ingest_remote(&self, rows: Vec<Value>) -> Result<Vec<T>> {
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<T>(row.clone()) {
                Ok(record) => {
                    self.local.save(T::TABLE, &row).await?;
                    data.push(record);
                }
                Err(err) => {
                    tracing::warn!(table = T::TABLE, error = %err, "dropping malformed remote row");
                }
            }
        }
        Ok(data)
    }

    /// Rebuild the view from the cache, applying scope, filters, and a
    /// stable sort in-process.
    async fn load_cached(&self) -> Result<Vec<T>> {
        let rows = self.local.get_all(T::TABLE).await?;

        let mut filtered: Vec<Value> = rows
            .into_iter()
            .filter(|row| {
                if let Some(band_id) = &self.options.band_id {
                    if field(row, "band_id").as_str() != Some(band_id.as_str()) {
                        return false;
                    }
                }
                self.options
                    .filters
                    .iter()
                    .all(|(column, value)| field(row, column) == value)
            })
            .collect();

        if let Some(order) = &self.options.order_by {
            filtered.sort_by(|a, b| {
                let ordering = cmp_values(field(a, &order.column), field(b, &order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let mut data = Vec::with_capacity(filtered.len());
        for row in filtered {
            match serde_json::from_value::<T>(row) {
                Ok(record) => data.push(record),
                Err(err) => {
                    tracing::warn!(table = T::TABLE, error = %err, "dropping malformed cached row");
                }
            }
        }
        Ok(data)
    }

    /// Merge partial fields into the cached record and the view; when
    /// `enqueue` is set, also queue the full merged record for replay.
    /// Matches the remote semantics of updating only existing rows: a
    /// record absent from the cache is left alone.
    async fn merge_cached(&self, id: &str, fields: &Value, enqueue: bool) -> Result<()> {
        let Some(mut merged) = self.local.get(T::TABLE, id).await? else {
            return Ok(());
        };
        merge_fields(&mut merged, fields);
        self.local.save(T::TABLE, &merged).await?;

        if enqueue {
            self.local
                .enqueue(NewPendingOperation::update(T::TABLE, merged.clone()))
                .await?;
        }

        match serde_json::from_value::<T>(merged) {
            Ok(record) => self.replace_view(record),
            Err(err) => {
                tracing::warn!(table = T::TABLE, id, error = %err, "merged record failed validation, view left as-is");
            }
        }
        Ok(())
    }

    fn set_loading(&self, loading: bool) {
        self.state.write().expect("view state poisoned").loading = loading;
    }

    fn push_view(&self, record: T) {
        self.state
            .write()
            .expect("view state poisoned")
            .data
            .push(record);
    }

    fn replace_view(&self, record: T) {
        let mut state = self.state.write().expect("view state poisoned");
        if let Some(slot) = state.data.iter_mut().find(|r| r.id() == record.id()) {
            *slot = record;
        }
    }

    fn drop_view(&self, id: &str) {
        self.state
            .write()
            .expect("view state poisoned")
            .data
            .retain(|r| r.id() != id);
    }
}

/// Wait on the feed when there is one; otherwise park until the select's
/// other branch fires.
async fn next_notice(
    feed: &mut Option<crate::remote::ChangeFeed>,
) -> Option<crate::remote::ChangeNotice> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}

impl<T: SyncRecord> Drop for SyncedCollection<T> {
    fn drop(&mut self) {
        if let Some(task) = self.realtime.lock().expect("realtime slot poisoned").take() {
            task.abort();
        }
    }
}

impl<T: SyncRecord> std::fmt::Debug for SyncedCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedCollection")
            .field("table", &T::TABLE)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
