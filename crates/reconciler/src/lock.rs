//! Per-object serialization of reconciliation passes.
//!
//! The remote store is last-writer-wins and the reconciler holds no lock of
//! its own. Two passes against the same object must not overlap; callers
//! that may run them concurrently share one [`ObjectLocks`] registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of async mutexes keyed by remote object identifier.
#[derive(Debug, Clone, Default)]
pub struct ObjectLocks {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Exclusive access to one object's metadata; released on drop.
#[derive(Debug)]
pub struct ObjectGuard {
    object_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl ObjectGuard {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl ObjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `object_id`.
    pub async fn acquire(&self, object_id: &str) -> ObjectGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(object_id.to_string()).or_default())
        };

        trace!(object_id, "Waiting for object lock");
        let guard = slot.lock_owned().await;
        ObjectGuard {
            object_id: object_id.to_string(),
            _guard: guard,
        }
    }

    /// Drop registry slots nobody holds or waits on.
    pub async fn prune(&self) {
        self.slots
            .lock()
            .await
            .retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    /// Number of objects with a registry slot.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
