//! Store trait definition

use crate::{InMemoryStore, Result, StoreConfig};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Key-value store used by the compression cache
///
/// Body entries are plain byte strings that grow through [`append`]; header
/// records are string hashes. Every operation completes independently: the
/// trait offers no transactions, so callers that check and then write can race.
///
/// [`append`]: CacheStore::append
#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the full value of a byte-string key
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Set a byte-string value that expires after `ttl`
    ///
    /// Replaces any previous value and its expiry.
    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Append to a byte-string value, creating it (without expiry) if missing
    ///
    /// The remaining time-to-live of an existing key is left as it is.
    /// Returns the length of the value after the append.
    async fn append(&self, key: &str, value: Bytes) -> Result<usize>;

    /// Set fields of a hash, creating it if missing
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// Get every field of a hash
    ///
    /// A missing key yields an empty map.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Remaining time-to-live of a key
    ///
    /// `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Health check - verify the store is reachable
    async fn health_check(&self) -> Result<()> {
        self.exists("__health_check__").await.map(|_| ())
    }
}

/// Open the store described by `config`
///
/// Connection failures are returned as [`Error::Connection`](crate::Error::Connection); callers treat
/// them as fatal.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn CacheStore>> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory cache store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "redis-backend")]
        StoreConfig::Redis(redis) => {
            let store = crate::RedisStore::connect(&redis.normalized()).await?;
            info!(addr = %redis.display_addr(), "Redis cache store is ready");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-backend"))]
        StoreConfig::Redis(_) => Err(crate::Error::InvalidConfig(
            "redis store requested but the redis-backend feature is disabled".to_string(),
        )),
    }
}
