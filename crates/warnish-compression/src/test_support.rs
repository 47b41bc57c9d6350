//! Store double with switchable failures and an operation counter

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use warnish_store::{CacheStore, Error, InMemoryStore, Result};

#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: InMemoryStore,
    fail_exists: bool,
    fail_writes: bool,
    fail_reads: bool,
    fail_get: bool,
    phantom_exists: bool,
    operations: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn reliable() -> Self {
        Self::default()
    }

    pub(crate) fn failing_exists() -> Self {
        Self {
            fail_exists: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    /// Only GET fails; EXISTS and HGETALL still work
    pub(crate) fn failing_get() -> Self {
        Self {
            fail_get: true,
            ..Self::default()
        }
    }

    /// EXISTS always says yes, as if the key expired right after the check
    pub(crate) fn phantom_exists() -> Self {
        Self {
            phantom_exists: true,
            ..Self::default()
        }
    }

    pub(crate) fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub(crate) fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

fn injected() -> Error {
    Error::Backend("injected failure".to_string())
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.count();
        if self.fail_exists {
            return Err(injected());
        }
        if self.phantom_exists {
            return Ok(true);
        }
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.count();
        if self.fail_reads || self.fail_get {
            return Err(injected());
        }
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.count();
        if self.fail_writes {
            return Err(injected());
        }
        self.inner.set_ex(key, value, ttl).await
    }

    async fn append(&self, key: &str, value: Bytes) -> Result<usize> {
        self.count();
        if self.fail_writes {
            return Err(injected());
        }
        self.inner.append(key, value).await
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.count();
        self.inner.hset_multiple(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.count();
        if self.fail_reads {
            return Err(injected());
        }
        self.inner.hgetall(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.inner.ttl(key).await
    }
}
