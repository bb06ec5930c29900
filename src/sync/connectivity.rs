//! # Connectivity Monitor
//!
//! Tracks online/offline state for the rest of the sync core. Status
//! reads are point-in-time; transitions are published edge-triggered over
//! a watch channel, so setting the same state twice never wakes anyone.
//!
//! The reading is advisory. An "online" monitor does not guarantee a
//! remote write will succeed; every online-path write still handles
//! failure by falling back to the offline path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::RemoteGateway;

/// Shared online/offline flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Point-in-time online status.
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Record a status change. No-op (and no notification) when the state
    /// is unchanged.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Receiver that wakes once per transition edge.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Drive the flag from periodic gateway health checks.
    pub fn spawn_probe(
        &self,
        gateway: Arc<dyn RemoteGateway>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = gateway.health().await.is_ok();
                if online != monitor.is_online() {
                    tracing::info!(online, "connectivity changed");
                }
                monitor.set_online(online);
            }
        })
    }
}
