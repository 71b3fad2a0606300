//! Redis-backed flag store.
//!
//! # Responsibilities
//! - Hold one lazily established `ConnectionManager`, reused by all requests
//! - Bound every round trip (connect, GET, SET) by `io_timeout`
//! - Back off reconnect attempts so an absent server costs nothing per request
//!
//! # Wire Format
//! - Open: `SET circuit:<name>:open 1 EX <lease>`
//! - Not open: `SET circuit:<name>:open 0` (no expiry)
//! - Reads accept `1|0|t|f|true|false`, case-insensitive

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::sync::Mutex;
use tokio::time;

use crate::config::SharedStoreConfig;
use crate::store::{FlagStore, StoreError};

#[derive(Default)]
struct ConnectionSlot {
    manager: Option<ConnectionManager>,
    last_failure: Option<Instant>,
}

/// Flag store talking to a Redis server.
pub struct RedisFlagStore {
    client: Client,
    slot: Mutex<ConnectionSlot>,
    io_timeout: Duration,
    reconnect_interval: Duration,
}

impl RedisFlagStore {
    /// Create a store. Only the URL is checked here; no connection is made.
    pub fn new(config: &SharedStoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            slot: Mutex::new(ConnectionSlot::default()),
            io_timeout: config.io_timeout(),
            reconnect_interval: config.reconnect_interval(),
        })
    }

    /// Return the shared connection, establishing it if needed.
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let mut slot = self.slot.lock().await;
        if let Some(manager) = &slot.manager {
            return Ok(manager.clone());
        }

        if let Some(failed_at) = slot.last_failure {
            if failed_at.elapsed() < self.reconnect_interval {
                return Err(StoreError::Unavailable(
                    "waiting before reconnect attempt".to_string(),
                ));
            }
        }

        match time::timeout(self.io_timeout, ConnectionManager::new(self.client.clone())).await {
            Ok(Ok(manager)) => {
                tracing::info!("Shared store connection established");
                slot.manager = Some(manager.clone());
                slot.last_failure = None;
                Ok(manager)
            }
            Ok(Err(e)) => {
                slot.last_failure = Some(Instant::now());
                Err(StoreError::Unavailable(e.to_string()))
            }
            Err(_) => {
                slot.last_failure = Some(Instant::now());
                Err(StoreError::Timeout(self.io_timeout))
            }
        }
    }
}

#[async_trait]
impl FlagStore for RedisFlagStore {
    async fn get(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let mut conn = self.connection().await?;

        let value: Option<String> = time::timeout(self.io_timeout, conn.get::<_, Option<String>>(key))
            .await
            .map_err(|_| StoreError::Timeout(self.io_timeout))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::trace!(key = %key, value = ?value, "Shared flag GET");
        value.as_deref().map(parse_flag).transpose()
    }

    async fn set(&self, key: &str, open: bool, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let value = encode_flag(open);

        let write = async {
            match ttl {
                Some(ttl) => conn.set_ex::<_, _, ()>(key, value, lease_secs(ttl)).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        };

        time::timeout(self.io_timeout, write)
            .await
            .map_err(|_| StoreError::Timeout(self.io_timeout))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::trace!(key = %key, value = %value, ttl = ?ttl, "Shared flag SET");
        Ok(())
    }
}

fn encode_flag(open: bool) -> &'static str {
    if open {
        "1"
    } else {
        "0"
    }
}

/// Parse a stored flag value.
pub fn parse_flag(raw: &str) -> Result<bool, StoreError> {
    let raw = raw.trim();
    const TRUE: [&str; 3] = ["1", "t", "true"];
    const FALSE: [&str; 3] = ["0", "f", "false"];

    if TRUE.iter().any(|v| raw.eq_ignore_ascii_case(v)) {
        Ok(true)
    } else if FALSE.iter().any(|v| raw.eq_ignore_ascii_case(v)) {
        Ok(false)
    } else {
        Err(StoreError::Malformed(raw.to_string()))
    }
}

/// Redis `EX` takes whole seconds; round up, never below one.
pub fn lease_secs(lease: Duration) -> u64 {
    let secs = lease.as_secs() + u64::from(lease.subsec_nanos() > 0);
    secs.max(1)
}
