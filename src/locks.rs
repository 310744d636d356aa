//! Keyed async mutual exclusion.
//!
//! Used to serialise check-then-insert and read-modify-write sequences that
//! must not interleave for the same key (a wallet address, a portfolio id)
//! while leaving different keys fully concurrent.

use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock();
            if map.len() >= PRUNE_THRESHOLD {
                // Nobody holds or waits on a slot whose only owner is the map.
                map.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            map.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
