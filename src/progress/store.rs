//! Concurrent map of transfer identifiers to their latest snapshot.
//!
//! The store is the single source of truth for point-in-time queries and
//! republishes every mutation to its [`BroadcastHub`]. Only the execution
//! that owns an identifier mutates its record, so the map's locking only
//! protects structure and concurrent readers.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::trace;

use super::hub::BroadcastHub;
use super::types::Progress;

/// Progress records keyed by transfer identifier.
///
/// Records are never removed; they stay in their terminal state until the
/// process exits.
#[derive(Debug, Default)]
pub struct ProgressStore {
    records: DashMap<String, Progress>,
    hub: BroadcastHub,
}

impl ProgressStore {
    /// Creates an empty store publishing to `hub`.
    #[must_use]
    pub fn new(hub: BroadcastHub) -> Self {
        Self {
            records: DashMap::new(),
            hub,
        }
    }

    /// The hub this store publishes to.
    #[must_use]
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Inserts `initial` under its id, replacing any earlier record, and
    /// publishes it.
    pub fn register(&self, initial: Progress) {
        let snapshot = initial.clone();
        self.records.insert(initial.id.clone(), initial);
        self.hub.publish(&snapshot);
    }

    /// Applies `f` to the record for `id` under exclusive access, then
    /// publishes the result.
    ///
    /// Returns the post-mutation snapshot, or `None` when `id` is unknown or
    /// its record is already terminal (terminal records never change).
    pub fn mutate<F>(&self, id: &str, f: F) -> Option<Progress>
    where
        F: FnOnce(&mut Progress),
    {
        let snapshot = {
            let mut record = self.records.get_mut(id)?;
            if record.status.is_terminal() {
                trace!(transfer = id, status = %record.status, "ignoring update to terminal record");
                return None;
            }
            f(&mut *record);
            record.clone()
        };
        // Shard lock released before fan-out
        self.hub.publish(&snapshot);
        Some(snapshot)
    }

    /// Current snapshot for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Progress> {
        self.records.get(id).map(|record| record.clone())
    }

    /// Copies every record.
    #[must_use]
    pub fn get_all(&self) -> HashMap<String, Progress> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of records, terminal ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no transfer has ever registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
