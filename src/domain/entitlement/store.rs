//! Shared entitlement store.
//!
//! Holds the current [`EntitlementSnapshot`] behind a `watch` channel:
//! readers clone an `Arc` and never hold a lock across an await point, and
//! the writer swaps the whole snapshot in one step. Readers therefore see
//! either the previous snapshot or the next one, never a mix.
//!
//! Only the reconciler writes; `replace` is crate-private for that reason.

use std::sync::Arc;

use tokio::sync::watch;

use super::EntitlementSnapshot;

/// Single-writer, many-reader holder of the current entitlement snapshot.
pub struct EntitlementStore {
    sender: watch::Sender<Arc<EntitlementSnapshot>>,
}

impl EntitlementStore {
    /// Creates a store holding an empty snapshot.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(EntitlementSnapshot::empty()));
        Self { sender }
    }

    /// Returns the current snapshot.
    pub fn current(&self) -> Arc<EntitlementSnapshot> {
        self.sender.borrow().clone()
    }

    /// Subscribes to snapshot replacements.
    ///
    /// The receiver observes every full replacement; intermediate states of a
    /// reconciliation pass are never published.
    pub fn subscribe(&self) -> watch::Receiver<Arc<EntitlementSnapshot>> {
        self.sender.subscribe()
    }

    /// Atomically replaces the snapshot, returning the new one.
    pub(crate) fn replace(&self, snapshot: EntitlementSnapshot) -> Arc<EntitlementSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.sender.send_replace(Arc::clone(&snapshot));
        snapshot
    }
}

impl Default for EntitlementStore {
    fn default() -> Self {
        Self::new()
    }
}
