//! Fan-out of progress snapshots to live subscribers.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: when a
//! queue is full the update is dropped for that subscriber only, so a slow
//! consumer loses intermediate snapshots but cannot stall transfers or
//! other consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use super::types::Progress;

/// Queue capacity given to each subscriber unless overridden.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Publish/subscribe hub for [`Progress`] snapshots.
///
/// Cloning yields another handle to the same subscriber set.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, mpsc::Sender<Progress>)>>,
}

impl HubInner {
    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        // Dropping the sender closes the queue
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    /// Creates a hub with [`DEFAULT_SUBSCRIBER_CAPACITY`] per subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Creates a hub whose subscriber queues hold `capacity` snapshots
    /// (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a new subscriber queue.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, sender));
        debug!(subscriber = id, "progress subscriber added");
        Subscription {
            id,
            receiver,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Removes `subscription` from the active set and closes its queue.
    pub fn unsubscribe(&self, subscription: Subscription) {
        // Drop does the removal
        drop(subscription);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Offers `progress` to every subscriber without waiting.
    pub fn publish(&self, progress: &Progress) {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(id, sender)| match sender.try_send(progress.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(subscriber = id, transfer = %progress.id, "subscriber queue full, update dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

/// Receiving end of a hub subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Progress>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Waits for the next snapshot. `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Progress> {
        self.receiver.recv().await
    }

    /// Takes a queued snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<Progress> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade()
            && hub.remove(self.id)
        {
            debug!(subscriber = self.id, "progress subscriber removed");
        }
    }
}
