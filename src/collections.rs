//! Application assembly of one synchronized collection per entity type.
//!
//! Each collection is preconfigured the way the feature surfaces consume
//! it: events by date ascending, tasks and notes and setlists newest
//! first, budget items by transaction date descending, setlist songs in
//! playing order.

use std::sync::Arc;

use crate::collection::{CollectionOptions, SyncedCollection};
use crate::local_db::LocalDatabase;
use crate::remote::{OrderBy, RemoteGateway};
use crate::shared::models::{BudgetItem, Event, Note, Setlist, SetlistSong, SyncRecord, Task};
use crate::sync::ConnectivityMonitor;

/// Every synchronized collection for one band.
#[derive(Debug)]
pub struct BandCollections {
    pub events: Arc<SyncedCollection<Event>>,
    pub tasks: Arc<SyncedCollection<Task>>,
    pub notes: Arc<SyncedCollection<Note>>,
    pub budget_items: Arc<SyncedCollection<BudgetItem>>,
    pub setlists: Arc<SyncedCollection<Setlist>>,
    pub setlist_songs: Arc<SyncedCollection<SetlistSong>>,
}

fn collection<T: SyncRecord>(
    local: &Arc<LocalDatabase>,
    gateway: &Arc<dyn RemoteGateway>,
    connectivity: &ConnectivityMonitor,
    options: CollectionOptions,
) -> Arc<SyncedCollection<T>> {
    let collection = Arc::new(SyncedCollection::new(
        Arc::clone(local),
        Arc::clone(gateway),
        connectivity.clone(),
        options,
    ));
    collection.start_realtime();
    collection
}

impl BandCollections {
    /// Build the collections and start their change-feed subscriptions.
    pub fn new(
        local: Arc<LocalDatabase>,
        gateway: Arc<dyn RemoteGateway>,
        connectivity: ConnectivityMonitor,
        band_id: impl Into<String>,
        base: CollectionOptions,
    ) -> Self {
        let band_id = band_id.into();
        let options = |order: OrderBy| base.clone().band(band_id.clone()).order(order);

        Self {
            events: collection(&local, &gateway, &connectivity, options(OrderBy::ascending("date"))),
            tasks: collection(
                &local,
                &gateway,
                &connectivity,
                options(OrderBy::descending("created_at")),
            ),
            notes: collection(
                &local,
                &gateway,
                &connectivity,
                options(OrderBy::descending("created_at")),
            ),
            budget_items: collection(
                &local,
                &gateway,
                &connectivity,
                options(OrderBy::descending("date")),
            ),
            setlists: collection(
                &local,
                &gateway,
                &connectivity,
                options(OrderBy::descending("created_at")),
            ),
            setlist_songs: collection(
                &local,
                &gateway,
                &connectivity,
                options(OrderBy::ascending("order")),
            ),
        }
    }

    /// Load every collection once, typically right after startup.
    pub async fn refresh_all(&self) -> crate::collection::Result<()> {
        self.events.refresh().await?;
        self.tasks.refresh().await?;
        self.notes.refresh().await?;
        self.budget_items.refresh().await?;
        self.setlists.refresh().await?;
        self.setlist_songs.refresh().await?;
        Ok(())
    }
}
