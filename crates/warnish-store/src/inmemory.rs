//! In-memory store implementation

use crate::{CacheStore, Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
enum Value {
    Bytes(BytesMut),
    Hash(HashMap<String, String>),
}

/// Entry in the in-memory store
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// In-memory store
///
/// Mirrors the Redis semantics the cache relies on (append never touches the
/// expiry, wrong-type access fails) without any network round trips.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    store: Arc<DashMap<String, Entry>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries
    pub fn cleanup(&self) {
        let mut removed = 0;
        self.store.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(removed, "Cleaned up expired entries");
        }
    }

    /// Get the number of entries in the store
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Live entry for `key`, evicting it first if it has expired
    fn live(&self, key: &str) -> Option<dashmap::mapref::one::Ref<'_, String, Entry>> {
        let entry = self.store.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.store.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(entry)
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        trace!(key, "InMemory EXISTS");
        Ok(self.live(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        trace!(key, "InMemory GET");

        match self.live(key) {
            Some(entry) => match &entry.value {
                Value::Bytes(bytes) => Ok(Some(Bytes::copy_from_slice(bytes))),
                Value::Hash(_) => Err(Error::WrongType(key.to_string())),
            },
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        trace!(key, ttl_secs = ttl.as_secs(), "InMemory SETEX");

        let entry = Entry::new(Value::Bytes(BytesMut::from(&value[..])), Some(ttl));
        self.store.insert(key.to_string(), entry);

        Ok(())
    }

    async fn append(&self, key: &str, value: Bytes) -> Result<usize> {
        trace!(key, len = value.len(), "InMemory APPEND");

        match self.store.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) if !occupied.get().is_expired() => {
                match &mut occupied.get_mut().value {
                    Value::Bytes(bytes) => {
                        bytes.extend_from_slice(&value);
                        Ok(bytes.len())
                    }
                    Value::Hash(_) => Err(Error::WrongType(key.to_string())),
                }
            }
            MapEntry::Occupied(mut occupied) => {
                occupied.insert(Entry::new(Value::Bytes(BytesMut::from(&value[..])), None));
                Ok(value.len())
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(Value::Bytes(BytesMut::from(&value[..])), None));
                Ok(value.len())
            }
        }
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        trace!(key, fields = fields.len(), "InMemory HSET");

        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new()), None));

        if entry.is_expired() {
            *entry = Entry::new(Value::Hash(HashMap::new()), None);
        }

        match &mut entry.value {
            Value::Hash(hash) => {
                for (field, value) in fields {
                    hash.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            Value::Bytes(_) => Err(Error::WrongType(key.to_string())),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        trace!(key, "InMemory HGETALL");

        match self.live(key) {
            Some(entry) => match &entry.value {
                Value::Hash(hash) => Ok(hash.clone()),
                Value::Bytes(_) => Err(Error::WrongType(key.to_string())),
            },
            None => Ok(HashMap::new()),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self.live(key).and_then(|entry| {
            entry
                .expires_at
                .map(|exp| exp.saturating_duration_since(Instant::now()))
        }))
    }
}
