//! In-process flag store.
//!
//! Used when no shared store is configured and as the test fake. Instances
//! sharing one `Arc<MemoryFlagStore>` behave like processes sharing a server.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::{FlagStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    open: bool,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Concurrent map with per-key expiry, checked on read.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    entries: DashMap<String, Entry>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expiry of a live key, `None` when absent or persistent.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.entries.get(key).and_then(|e| e.expires_at)
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let now = Instant::now();
        let live = self.entries.get(key).map(|entry| (*entry, entry.is_live(now)));
        match live {
            Some((entry, true)) => Ok(Some(entry.open)),
            Some((_, false)) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, open: bool, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_string(), Entry { open, expires_at });
        Ok(())
    }
}
