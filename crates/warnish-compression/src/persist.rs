//! Incremental persistence of compressed chunks
//!
//! Write-side store failures never reach the client. They are logged and
//! dropped here, and the caller keeps streaming.

use crate::keys::CacheKeys;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use warnish_store::CacheStore;

/// What [`append_or_create`] did with a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkWrite {
    /// The key was missing and was created with the chunk and a fresh TTL
    Created,
    /// The chunk was appended; the remaining TTL is unchanged
    Appended,
}

/// Append `chunk` to `key`, or create `key` with it and `ttl`
///
/// Only the existence check can fail: then nothing was written and the
/// caller should skip whatever it would have done next. A failed APPEND or
/// SETEX is logged and reported as done, the chunk is simply lost for the
/// cache.
///
/// The check and the write are separate round trips. Two writers racing on
/// a missing key can both create it, and the later SETEX wins.
pub async fn append_or_create(
    store: &dyn CacheStore,
    key: &str,
    chunk: Bytes,
    ttl: Duration,
) -> warnish_store::Result<ChunkWrite> {
    if store.exists(key).await? {
        if let Err(error) = store.append(key, chunk).await {
            debug!(key, %error, "Dropping cache append");
        }
        Ok(ChunkWrite::Appended)
    } else {
        if let Err(error) = store.set_ex(key, chunk, ttl).await {
            debug!(key, %error, "Dropping cache create");
        }
        Ok(ChunkWrite::Created)
    }
}

/// Current time as an HTTP date (IMF-fixdate)
pub fn http_date_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Persists the chunks of one response
#[derive(Debug, Clone)]
pub struct CachePersistence {
    store: Arc<dyn CacheStore>,
    keys: CacheKeys,
    ttl: Duration,
    content_type: Option<String>,
}

impl CachePersistence {
    /// Persistence for the entry at `keys`
    ///
    /// `content_type` is stored with all spaces removed.
    pub fn new(
        store: Arc<dyn CacheStore>,
        keys: CacheKeys,
        ttl: Duration,
        content_type: Option<&str>,
    ) -> Self {
        Self {
            store,
            keys,
            ttl,
            content_type: content_type
                .map(|ct| ct.replace(' ', ""))
                .filter(|ct| !ct.is_empty()),
        }
    }

    /// Keys this persistence writes to
    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Persist one compressed chunk, then refresh the header record
    ///
    /// The header record is rewritten for every chunk; the values only ever
    /// move forward in time, so the repetition is harmless.
    pub async fn persist(&self, chunk: &Bytes) {
        trace!(key = %self.keys.body, len = chunk.len(), "Saving compressed chunk");

        match append_or_create(&*self.store, &self.keys.body, chunk.clone(), self.ttl).await {
            Ok(_) => self.record_headers().await,
            Err(error) => {
                debug!(key = %self.keys.body, %error, "Cache existence check failed, chunk not cached");
            }
        }
    }

    async fn record_headers(&self) {
        let mut fields = Vec::with_capacity(2);
        if let Some(content_type) = &self.content_type {
            fields.push(("Content-Type".to_string(), content_type.clone()));
        }
        fields.push(("Last-Modified".to_string(), http_date_now()));

        if let Err(error) = self.store.hset_multiple(&self.keys.header, &fields).await {
            debug!(key = %self.keys.header, %error, "Dropping header record update");
        }
    }
}
