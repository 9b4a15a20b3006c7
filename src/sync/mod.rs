//! Sync Coordinator
//!
//! Watches connectivity notifications and drains the pending-write queue
//! whenever the state moves from Offline to Online. Delivery is
//! at-least-once: an entry is removed only after its remote call succeeds,
//! so an interrupted drain leaves the rest for the next reconnect.

pub mod sink;

pub use sink::{HttpSink, LogSink, SyncSink};

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AgriError;
use crate::store::OfflineStore;

/// Network reachability as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// Process-wide connectivity flag, injected wherever it is needed.
///
/// Platform glue calls [`ConnectivityMonitor::set`] on "became reachable" and
/// "became unreachable" notifications; everyone else only reads or subscribes.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, state: Connectivity) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            info!("🌐 Connectivity changed: {:?} -> {:?}", current, state);
            *current = state;
            true
        });
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Keys delivered and removed
    pub delivered: Vec<String>,
    /// Keys whose delivery failed; they stay pending
    pub failed: Vec<String>,
    /// Keys that disappeared before they could be read
    pub skipped: Vec<String>,
}

/// Drains pending operations from the store into a remote sink
pub struct SyncCoordinator {
    store: OfflineStore,
    sink: Arc<dyn SyncSink>,
    connectivity: ConnectivityMonitor,
    drain_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        store: OfflineStore,
        sink: Arc<dyn SyncSink>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            store,
            sink,
            connectivity,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Attempt delivery of every pending operation, one at a time.
    ///
    /// Does nothing while offline. Failures are logged and the entry kept.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.connectivity.is_online() {
            debug!("Skipping drain while offline");
            return report;
        }

        // Overlapping drains could submit the same entry twice
        let _guard = self.drain_lock.lock().await;

        let keys = self.store.pending_keys().await;
        if keys.is_empty() {
            return report;
        }
        info!("🔄 Draining {} pending operations via {}", keys.len(), self.sink.name());

        for key in keys {
            let Some(record) = self.store.read_pending(&key).await else {
                report.skipped.push(key);
                continue;
            };

            match self.sink.deliver(&key, &record).await {
                Ok(()) => {
                    debug!("Synced pending operation '{}'", key);
                    if !self.store.settle_pending(&key, &record).await {
                        debug!("'{}' changed while syncing, keeping the newer version", key);
                    }
                    report.delivered.push(key);
                }
                Err(e) => {
                    let err = AgriError::SyncDrain(format!("{}: {}", key, e));
                    warn!("⚠️ {}", err);
                    report.failed.push(key);
                }
            }
        }

        info!(
            "✅ Drain finished: {} delivered, {} still pending",
            report.delivered.len(),
            report.failed.len()
        );
        report
    }

    /// Start the event loop that drains on every Offline to Online transition.
    ///
    /// Dropping the returned handle also stops the loop.
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let mut rx = self.connectivity.subscribe();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let coordinator = Arc::clone(&self);

        let task = tokio::spawn(async move {
            // The monitor only notifies on real changes, so an Online value
            // here means connectivity was regained since the last look, even
            // if an Offline blip was coalesced while a drain was running.
            rx.borrow_and_update();
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            debug!("Connectivity monitor dropped, stopping sync loop");
                            break;
                        }
                        let state = *rx.borrow_and_update();
                        if state.is_online() {
                            coordinator.drain().await;
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        info!("🛰️ Sync coordinator listening for connectivity changes");
        SyncHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running sync loop
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop the loop, waiting for an in-flight drain to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Sync loop ended abnormally: {}", e);
        }
    }
}
