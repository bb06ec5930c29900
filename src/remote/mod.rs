//! # Remote Data Gateway
//!
//! Abstraction over the authoritative remote store: filtered reads,
//! writes by id, and a best-effort change feed per table and band. The
//! rest of the crate only sees the [`RemoteGateway`] trait and receives a
//! concrete gateway by injection, so collections and the sync manager can
//! be exercised against [`MemoryGateway`] without any network.
//!
//! Change notifications carry no payload; subscribers re-query on every
//! notice. Delivery is best-effort and may be delayed or dropped, which
//! is why refresh also happens on connectivity edges and on demand.

pub mod memory;
pub mod postgrest;

pub use memory::MemoryGateway;
pub use postgrest::PostgrestGateway;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::shared::error::RemoteError;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Filtered-read options: owner scope, equality filters, and ordering.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub band_id: Option<String>,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
}

/// Sort column and direction.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

impl QueryOptions {
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
}

/// A payload-free change notification for one table.
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    pub table: String,
}

/// Live subscription to a table's change feed.
///
/// Owns the background task that produces notices; dropping the feed
/// aborts it, so a discarded subscription cannot keep running.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: mpsc::Receiver<ChangeNotice>,
    task: JoinHandle<()>,
}

impl ChangeFeed {
    pub fn new(rx: mpsc::Receiver<ChangeNotice>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next change notice, or `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<ChangeNotice> {
        self.rx.recv().await
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The authoritative store, reduced to what the sync core needs.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Filtered read of one table.
    async fn query(&self, table: &str, options: &QueryOptions) -> Result<Vec<Value>>;

    /// Insert one record, returning the stored row (which may include
    /// server-assigned defaults).
    async fn insert(&self, table: &str, record: &Value) -> Result<Value>;

    /// Partial update of one row by id.
    async fn update(&self, table: &str, id: &str, fields: &Value) -> Result<()>;

    /// Delete one row by id. Deleting an already-absent row succeeds.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;

    /// Cheap reachability check, used by the connectivity probe.
    async fn health(&self) -> Result<()>;

    /// Subscribe to change notices for one table scoped to one band.
    fn subscribe(&self, table: &str, band_id: &str) -> ChangeFeed;
}
