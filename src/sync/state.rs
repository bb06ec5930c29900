//! Sync status snapshots and pass reports.

use chrono::{DateTime, Utc};

/// Point-in-time view of the sync subsystem, for status displays.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub is_online: bool,
    /// True while a sync pass is in flight. At most one pass runs at a
    /// time; requests arriving during a pass are dropped.
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub pending_operations: u64,
}

/// Aggregate outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations replayed and dequeued
    pub synced: usize,
    /// Operations that failed and were left in the queue
    pub failed: usize,
}

/// What became of a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A pass ran to completion.
    Completed(SyncReport),
    /// Another pass was already in flight; this request was dropped.
    AlreadyRunning,
}

impl SyncOutcome {
    /// The report, if a pass actually ran.
    pub fn report(self) -> Option<SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}
