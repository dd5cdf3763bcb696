// Per-adventure write leases
// Serialises content writers for one adventure inside this process

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::AdventureId;

/// Held for the duration of one content write; dropping it releases the lease
pub struct AdventureLease {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Clone, Default)]
pub struct AdventureLeases {
    locks: Arc<Mutex<HashMap<AdventureId, Arc<Mutex<()>>>>>,
}

impl AdventureLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other writer holds `adventure_id`
    pub async fn acquire(&self, adventure_id: AdventureId) -> AdventureLease {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody is holding or waiting on
            locks.retain(|id, lock| *id == adventure_id || Arc::strong_count(lock) > 1);
            locks
                .entry(adventure_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        AdventureLease {
            _guard: lock.lock_owned().await,
        }
    }

    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
