//! Redis store implementation

use crate::{CacheStore, Error, RedisConfig, Result};
use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Redis store
///
/// Every clone shares one multiplexed connection that reconnects on its own
/// after a drop.
#[derive(Clone)]
pub struct RedisStore {
    client: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to the server at `url`
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Connection(e.to_string()))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        debug!("Redis store connected");

        Ok(Self {
            client: connection_manager,
        })
    }

    /// Connect using structured connection parameters
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let store = Self::new(&config.connection_url()).await?;
        store.health_check().await?;
        Ok(store)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        trace!(key, "Redis EXISTS");

        let mut conn = self.client.clone();
        let exists: bool = conn.exists(key).await?;

        Ok(exists)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        trace!(key, "Redis GET");

        let mut conn = self.client.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;

        Ok(value.map(Bytes::from))
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        trace!(key, ttl_secs = ttl.as_secs(), "Redis SETEX");

        let mut conn = self.client.clone();
        let _: () = conn.set_ex(key, value.as_ref(), ttl.as_secs().max(1)).await?;

        Ok(())
    }

    async fn append(&self, key: &str, value: Bytes) -> Result<usize> {
        trace!(key, len = value.len(), "Redis APPEND");

        let mut conn = self.client.clone();
        let len: usize = conn.append(key, value.as_ref()).await?;

        Ok(len)
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        trace!(key, fields = fields.len(), "Redis HSET");

        let mut conn = self.client.clone();
        let _: () = conn.hset_multiple(key, fields).await?;

        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        trace!(key, "Redis HGETALL");

        let mut conn = self.client.clone();
        let hash: HashMap<String, String> = conn.hgetall(key).await?;

        Ok(hash)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        trace!(key, "Redis PTTL");

        let mut conn = self.client.clone();
        let millis: i64 = conn.pttl(key).await?;

        // -2: missing key, -1: no expiry
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.client.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(Error::Backend("Unexpected PING response".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running Redis instance
    // Run with: docker run -p 6379:6379 redis:7-alpine

    async fn setup() -> Option<RedisStore> {
        RedisStore::connect(&RedisConfig::default()).await.ok()
    }

    #[tokio::test]
    async fn test_redis_append_or_create() {
        let Some(store) = setup().await else {
            eprintln!("Skipping Redis tests - Redis not available");
            return;
        };

        let key = "warnish_test:append";
        store
            .set_ex(key, Bytes::from_static(b"\x1f\x8b"), Duration::from_secs(30))
            .await
            .unwrap();
        store.append(key, Bytes::from_static(b"\x00\xff")).await.unwrap();

        assert_eq!(
            store.get(key).await.unwrap(),
            Some(Bytes::from_static(b"\x1f\x8b\x00\xff"))
        );
        assert!(store.ttl(key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(store) = setup().await else {
            return;
        };

        let key = "warnish_test:ttl";
        store
            .set_ex(key, Bytes::from_static(b"value"), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(store.exists(key).await.unwrap());

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!store.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_hash() {
        let Some(store) = setup().await else {
            return;
        };

        let key = "warnish_test:headers";
        store
            .hset_multiple(key, &[("Content-Type".to_string(), "text/html".to_string())])
            .await
            .unwrap();

        let hash = store.hgetall(key).await.unwrap();
        assert_eq!(hash.get("Content-Type").map(String::as_str), Some("text/html"));
    }

    #[tokio::test]
    async fn test_redis_health_check() {
        let Some(store) = setup().await else {
            return;
        };

        assert!(store.health_check().await.is_ok());
    }
}
