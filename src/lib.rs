//! BandBrain - Offline-First Band Data Layer
//!
//! BandBrain keeps a band's events, tasks, notes, budget items, and
//! setlists usable with or without a network. Every entity type is
//! exposed through a [`SyncedCollection`]: reads come from the remote
//! store when it is reachable and from the local SQLite cache when it is
//! not, writes go through to the remote store and fall back to a durable
//! pending-operations queue, and a background [`SyncManager`] replays
//! that queue in FIFO order when connectivity returns.
//!
//! # Module Structure
//!
//! - **`shared`** - entity records, configuration, errors, JSON helpers
//! - **`local_db`** - the local cache store and the pending-operations
//!   queue (SQLite via sqlx)
//! - **`remote`** - the remote data gateway trait, the PostgREST-backed
//!   implementation, and an in-memory gateway for tests and offline
//!   development
//! - **`sync`** - the connectivity monitor and the sync manager
//! - **`collection`** - the per-entity synchronized collection facade
//! - **`collections`** - assembly of all six collections for one band
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bandbrain::collection::CollectionOptions;
//! use bandbrain::collections::BandCollections;
//! use bandbrain::local_db::LocalDatabase;
//! use bandbrain::remote::{PostgrestGateway, RemoteGateway};
//! use bandbrain::shared::config::AppConfig;
//! use bandbrain::shared::models::NewTask;
//! use bandbrain::sync::{ConnectivityMonitor, SyncConfig, SyncManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let local = Arc::new(LocalDatabase::open_default().await?);
//! let gateway: Arc<dyn RemoteGateway> = Arc::new(PostgrestGateway::new(&config));
//! let connectivity = ConnectivityMonitor::new(true);
//!
//! let manager = Arc::new(SyncManager::new(
//!     Arc::clone(&local),
//!     Arc::clone(&gateway),
//!     connectivity.clone(),
//!     SyncConfig::default(),
//! ));
//! let _sync_task = manager.spawn();
//!
//! let collections = BandCollections::new(
//!     local,
//!     gateway,
//!     connectivity,
//!     "band-1",
//!     CollectionOptions::default(),
//! );
//! collections.refresh_all().await?;
//!
//! let task = collections
//!     .tasks
//!     .add(NewTask {
//!         band_id: "band-1".into(),
//!         title: "Book studio time".into(),
//!         assignee: String::new(),
//!         due_date: None,
//!     })
//!     .await?;
//! println!("created {}", task.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Everything runs on the tokio event loop; local and remote I/O suspend
//! at await points without blocking other tasks. The sync manager admits
//! a single pass at a time and drops extra triggers. Remote calls in the
//! core paths run under a bounded timeout and fall back to the offline
//! path when it elapses.

/// Shared types and data structures
pub mod shared;

/// Local cache store and pending-operations queue
pub mod local_db;

/// Remote data gateway
pub mod remote;

/// Connectivity monitor and sync manager
pub mod sync;

/// Per-entity synchronized collection facade
pub mod collection;

/// Assembly of all collections for one band
pub mod collections;

pub use collection::{CollectionOptions, SyncedCollection};
pub use collections::BandCollections;
pub use shared::config::AppConfig;
pub use shared::error::{LocalStoreError, RemoteError, SyncError};
pub use sync::{ConnectivityMonitor, SyncConfig, SyncManager, SyncOutcome, SyncReport, SyncStatus};
