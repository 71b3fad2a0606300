//! Shared health flag store.
//!
//! # Data Flow
//! ```text
//! Call gateway
//!     → SharedFlags (key naming, fail-open, logging)
//!     → FlagStore (memory.rs in-process, redis_store.rs cross-process)
//! ```
//!
//! # Design Decisions
//! - The flag is an advisory hint; local breaker state stays authoritative
//! - Reads fail open: absent, unreadable or malformed means `known = false`
//! - Writes are best-effort, never retried, and errors never reach callers
//! - Open flags carry a lease (TTL); the "not open" marker has none

pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::observability::metrics;

pub use self::memory::MemoryFlagStore;
pub use self::redis_store::RedisFlagStore;

/// Key holding the shared flag for a dependency.
pub fn flag_key(name: &str) -> String {
    format!("circuit:{}:open", name)
}

/// Store-level failure. Never leaves [`SharedFlags`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed flag value {0:?}")]
    Malformed(String),
}

/// Minimal key/value capability needed for the shared flag.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Read a flag. `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<bool>, StoreError>;

    /// Write a flag, with an expiry when `ttl` is set.
    async fn set(&self, key: &str, open: bool, ttl: Option<Duration>) -> Result<(), StoreError>;
}

/// Result of reading a shared flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagRead {
    pub is_open: bool,
    pub known: bool,
}

impl FlagRead {
    pub const UNKNOWN: FlagRead = FlagRead {
        is_open: false,
        known: false,
    };

    /// True only for a readable, open flag.
    pub fn blocks(&self) -> bool {
        self.known && self.is_open
    }
}

/// Gateway-facing facade over a [`FlagStore`].
#[derive(Clone)]
pub struct SharedFlags {
    store: Arc<dyn FlagStore>,
}

impl SharedFlags {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }

    /// Read the flag for `name`; any store failure degrades to unknown.
    pub async fn read_flag(&self, name: &str) -> FlagRead {
        match self.store.get(&flag_key(name)).await {
            Ok(Some(is_open)) => FlagRead {
                is_open,
                known: true,
            },
            Ok(None) => FlagRead::UNKNOWN,
            Err(e) => {
                tracing::warn!(dependency = %name, error = %e, "Error checking shared circuit flag");
                metrics::record_store_error("read");
                FlagRead::UNKNOWN
            }
        }
    }

    /// Mark `name` open for `lease`.
    pub async fn set_open(&self, name: &str, lease: Duration) {
        match self.store.set(&flag_key(name), true, Some(lease)).await {
            Ok(()) => {
                tracing::info!(dependency = %name, lease_secs = lease.as_secs(), "Shared circuit flag set open");
            }
            Err(e) => {
                tracing::warn!(dependency = %name, error = %e, "Error setting shared circuit flag");
                metrics::record_store_error("set_open");
            }
        }
    }

    /// Write the persistent "not open" marker for `name`.
    pub async fn clear_open(&self, name: &str) {
        match self.store.set(&flag_key(name), false, None).await {
            Ok(()) => {
                tracing::info!(dependency = %name, "Shared circuit flag cleared");
            }
            Err(e) => {
                tracing::warn!(dependency = %name, error = %e, "Error resetting shared circuit flag");
                metrics::record_store_error("clear_open");
            }
        }
    }
}
