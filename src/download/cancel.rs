//! Per-transfer cancellation handles.
//!
//! At most one live [`CancellationToken`] exists per identifier. A transfer
//! claims its identifier before registering progress and releases it by
//! dropping the returned [`CancelGuard`] on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct Claim {
    generation: u64,
    token: CancellationToken,
}

/// Identifiers of in-flight transfers and their cancellation tokens.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    claims: DashMap<String, Claim>,
    next_generation: AtomicU64,
}

impl CancelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id` for a new execution.
    ///
    /// Returns `None` while another execution still holds the identifier.
    #[must_use]
    pub fn claim(self: &Arc<Self>, id: &str) -> Option<CancelGuard> {
        match self.claims.entry(id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let token = CancellationToken::new();
                slot.insert(Claim {
                    generation,
                    token: token.clone(),
                });
                Some(CancelGuard {
                    id: id.to_string(),
                    generation,
                    token,
                    registry: Arc::clone(self),
                })
            }
        }
    }

    /// Signals the execution holding `id` to stop.
    ///
    /// Returns `false` when no execution holds `id`. The transfer observes
    /// the signal at its next suspension point.
    pub fn cancel(&self, id: &str) -> bool {
        match self.claims.get(id) {
            Some(claim) => {
                claim.token.cancel();
                debug!(transfer = id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Signals every active execution. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        for claim in &self.claims {
            claim.token.cancel();
            count += 1;
        }
        count
    }

    /// True while an execution holds `id`.
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.claims.contains_key(id)
    }

}

/// Ownership of one identifier in a [`CancelRegistry`]. Dropping releases it.
#[derive(Debug)]
pub struct CancelGuard {
    id: String,
    generation: u64,
    token: CancellationToken,
    registry: Arc<CancelRegistry>,
}

impl CancelGuard {
    /// Token the execution should watch.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        // Only release our own claim, never a later one for the same id
        self.registry
            .claims
            .remove_if(&self.id, |_, claim| claim.generation == self.generation);
    }
}
