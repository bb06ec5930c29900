//! Entity Records
//!
//! Typed record shapes for every table the application syncs: events,
//! tasks, notes, budget items, setlists, and setlist songs. Each entity
//! comes in three shapes:
//!
//! - the full record (what the remote store returns and the cache holds),
//! - a `New*` insert shape without an id (ids are generated client-side,
//!   so records created offline are addressable before any sync happens),
//! - a `*Patch` partial-update shape of all-optional fields, serialized
//!   with absent fields omitted so a patch carries only what changed.
//!
//! The sync core itself never looks inside these beyond `id` and
//! `band_id`; records cross the local/remote boundary as JSON field maps
//! and are validated by deserializing into the concrete type. Malformed
//! rows fail that step instead of propagating silently.

pub mod budget;
pub mod event;
pub mod note;
pub mod setlist;
pub mod task;

pub use budget::{BudgetItem, BudgetItemPatch, BudgetKind, NewBudgetItem};
pub use event::{Event, EventKind, EventPatch, NewEvent};
pub use note::{NewNote, Note, NotePatch};
pub use setlist::{
    NewSetlist, NewSetlistSong, Setlist, SetlistPatch, SetlistSong, SetlistSongPatch,
};
pub use task::{NewTask, Task, TaskPatch};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record that can live in a synchronized collection.
///
/// Binds an entity type to its remote table name, its insert and patch
/// shapes, and the accessors the sync core needs. Implementations are
/// plain data; all I/O lives elsewhere.
pub trait SyncRecord:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// Remote table and local cache namespace for this entity.
    const TABLE: &'static str;

    /// Insert shape without an id.
    type New: Serialize + Send + Sync;

    /// Partial-update shape; absent fields are omitted when serialized.
    type Patch: Serialize + Send + Sync;

    /// Construct a full record from a freshly generated id and an insert
    /// shape. Creation timestamps are stamped here.
    fn from_new(id: String, new: Self::New) -> Self;

    /// Globally unique identifier, generated client-side.
    fn id(&self) -> &str;

    /// Owning band scope.
    fn band_id(&self) -> &str;
}

/// Current time as the RFC 3339 string every record timestamp uses.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
