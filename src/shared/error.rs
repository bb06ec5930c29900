//! Shared Error Types
//!
//! Error taxonomy for the sync core, split by subsystem:
//!
//! - `RemoteError` - any failure talking to the remote store (network, auth,
//!   rejected writes). Always absorbed at the collection boundary and turned
//!   into the offline path; never surfaced to feature surfaces.
//! - `LocalStoreError` - failure to read or write the local cache. There is
//!   no further fallback, so these propagate to the caller.
//! - `SyncError` - failures of a whole sync pass (offline, or the local
//!   store itself is broken). Individual queue entries that fail to replay
//!   are logged and left in place, not raised through this type.

use std::time::Duration;
use thiserror::Error;

/// Failure from the remote data gateway.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (DNS, connect, TLS, read).
    #[error("network failure: {0}")]
    Network(String),

    /// The remote store rejected our credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The remote store rejected the request (constraint violation,
    /// malformed filter, unknown table).
    #[error("request rejected by remote store: {0}")]
    Rejected(String),

    /// An update addressed a row the remote store does not have.
    #[error("row not found: {table}/{id}")]
    NotFound { table: String, id: String },

    /// The call did not complete within the configured bound.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The gateway is not reachable at all.
    #[error("remote store unreachable")]
    Unreachable,

    /// The remote store answered with a body we could not interpret.
    #[error("malformed remote payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Failure of the local cache store.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// Underlying SQLite failure.
    #[error("local storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A cached row holds JSON we can no longer parse.
    #[error("corrupt record in table '{table}': {source}")]
    Corrupt {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be serialized for storage.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// Table names are restricted to `[a-z][a-z0-9_]*`.
    #[error("invalid table name '{0}'")]
    InvalidTable(String),

    /// Every stored record must carry a string `id` field.
    #[error("record for table '{table}' has no id field")]
    MissingId { table: String },
}

/// Failure of a sync pass as a whole.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync was requested while the connectivity monitor reports offline.
    #[error("cannot sync while offline")]
    Offline,

    /// The pending-operations queue could not be read or updated.
    #[error(transparent)]
    Local(#[from] LocalStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display() {
        let err = RemoteError::NotFound {
            table: "tasks".into(),
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "row not found: tasks/abc");
    }

    #[test]
    fn timeout_error_mentions_duration() {
        let err = RemoteError::Timeout(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn sync_error_wraps_local() {
        let err = SyncError::from(LocalStoreError::MissingId {
            table: "events".into(),
        });
        assert!(matches!(err, SyncError::Local(_)));
        assert!(err.to_string().contains("events"));
    }
}
