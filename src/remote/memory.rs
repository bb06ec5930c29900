//! In-memory gateway.
//!
//! A complete `RemoteGateway` over process memory, used to exercise
//! collections and the sync manager in isolation and to run the app
//! without credentials. Fault injection (`set_reachable`, `set_failing`),
//! artificial latency, and a call log make failure-path tests direct
//! instead of depending on a flaky network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::remote::{ChangeFeed, ChangeNotice, QueryOptions, RemoteGateway, Result};
use crate::shared::error::RemoteError;
use crate::shared::json::{cmp_values, field, merge_fields};

use async_trait::async_trait;

const FEED_BUFFER: usize = 8;
const CHANGE_CHANNEL: usize = 64;

/// One call the gateway has served, for assertions in tests.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub table: String,
    /// Record for writes, bare id for deletes, `Null` for reads
    pub payload: Value,
}

#[derive(Debug, Clone)]
struct ChangeEvent {
    table: String,
    band_id: Option<String>,
}

#[derive(Debug)]
struct Inner {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    reachable: AtomicBool,
    failing_tables: Mutex<HashSet<String>>,
    latency_ms: AtomicU64,
    log: Mutex<Vec<RecordedCall>>,
    changes: broadcast::Sender<ChangeEvent>,
}

/// In-process remote store.
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    inner: Arc<Inner>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL);
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                failing_tables: Mutex::new(HashSet::new()),
                latency_ms: AtomicU64::new(0),
                log: Mutex::new(Vec::new()),
                changes,
            }),
        }
    }

    /// Toggle whole-gateway reachability.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make writes against one table fail while the rest keep working.
    pub fn set_failing(&self, table: &str, failing: bool) {
        let mut tables = self.inner.failing_tables.lock().expect("failing_tables");
        if failing {
            tables.insert(table.to_string());
        } else {
            tables.remove(table);
        }
    }

    /// Delay every call by `latency`, to widen race windows in tests.
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Every call served so far.
    pub fn call_log(&self) -> Vec<RecordedCall> {
        self.inner.log.lock().expect("call log").clone()
    }

    /// Number of calls served for one method name.
    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .log
            .lock()
            .expect("call log")
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Pre-populate a table.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.inner.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Current contents of a table.
    pub async fn table(&self, table: &str) -> Vec<Value> {
        self.inner
            .tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    async fn gate(&self, method: &'static str, table: &str, payload: Value) -> Result<()> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.inner.log.lock().expect("call log").push(RecordedCall {
            method,
            table: table.to_string(),
            payload,
        });

        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable);
        }
        if self
            .inner
            .failing_tables
            .lock()
            .expect("failing_tables")
            .contains(table)
        {
            return Err(RemoteError::Rejected(format!(
                "table '{table}' is failing by test configuration"
            )));
        }
        Ok(())
    }

    fn notify(&self, table: &str, band_id: Option<String>) {
        // No receivers is fine; change delivery is best-effort.
        let _ = self.inner.changes.send(ChangeEvent {
            table: table.to_string(),
            band_id,
        });
    }
}

fn matches(row: &Value, options: &QueryOptions) -> bool {
    if let Some(band_id) = &options.band_id {
        if field(row, "band_id") != &Value::String(band_id.clone()) {
            return false;
        }
    }
    options
        .filters
        .iter()
        .all(|(column, value)| field(row, column) == value)
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn query(&self, table: &str, options: &QueryOptions) -> Result<Vec<Value>> {
        self.gate("query", table, Value::Null).await?;

        let tables = self.inner.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, options)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &options.order_by {
            rows.sort_by(|a, b| {
                let ordering = cmp_values(field(a, &order.column), field(b, &order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<Value> {
        self.gate("insert", table, record.clone()).await?;

        let id = field(record, "id").as_str().map(str::to_string);
        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(id) = &id {
            if rows.iter().any(|r| field(r, "id").as_str() == Some(id)) {
                return Err(RemoteError::Rejected(format!(
                    "duplicate key: {table}/{id}"
                )));
            }
        }

        rows.push(record.clone());
        let band = field(record, "band_id").as_str().map(str::to_string);
        drop(tables);

        self.notify(table, band);
        Ok(record.clone())
    }

    async fn update(&self, table: &str, id: &str, fields: &Value) -> Result<()> {
        self.gate("update", table, fields.clone()).await?;

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let Some(row) = rows
            .iter_mut()
            .find(|r| field(r, "id").as_str() == Some(id))
        else {
            return Err(RemoteError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        };

        merge_fields(row, fields);
        let band = field(row, "band_id").as_str().map(str::to_string);
        drop(tables);

        self.notify(table, band);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.gate("delete", table, Value::String(id.to_string()))
            .await?;

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let band = rows
            .iter()
            .find(|r| field(r, "id").as_str() == Some(id))
            .and_then(|r| field(r, "band_id").as_str().map(str::to_string));
        // Absent rows delete successfully.
        rows.retain(|r| field(r, "id").as_str() != Some(id));
        drop(tables);

        self.notify(table, band);
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable)
        }
    }

    fn subscribe(&self, table: &str, band_id: &str) -> ChangeFeed {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let mut changes = self.inner.changes.subscribe();
        let table = table.to_string();
        let band_id = band_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        if event.table != table {
                            continue;
                        }
                        if let Some(band) = &event.band_id {
                            if band != &band_id {
                                continue;
                            }
                        }
                        let notice = ChangeNotice {
                            table: table.clone(),
                        };
                        if tx.send(notice).await.is_err() {
                            break;
                        }
                    }
                    // A lagged receiver lost notices; subscribers re-query
                    // on the next one anyway.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        ChangeFeed::new(rx, task)
    }
}
