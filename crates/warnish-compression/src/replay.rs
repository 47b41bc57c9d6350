//! Replaying a stored body as an outgoing byte stream

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tracing::trace;
use warnish_core::{OutputSink, Result};
use warnish_store::CacheStore;

/// A stored body, read back for replay
///
/// The value is fetched once with a single GET, however many appends built
/// it, and is then handed out as zero-copy slices.
#[derive(Debug, Clone)]
pub struct StoreStream {
    store: Arc<dyn CacheStore>,
    key: String,
    chunk_size: usize,
}

impl StoreStream {
    /// Stream the value at `key` in pieces of at most `chunk_size` bytes
    pub fn new(store: Arc<dyn CacheStore>, key: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            store,
            key: key.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fetch the value
    ///
    /// `None` when the key has vanished since it was last seen.
    pub async fn open(&self) -> warnish_store::Result<Option<StoredBody>> {
        let value = self.store.get(&self.key).await?;
        trace!(key = %self.key, len = ?value.as_ref().map(Bytes::len), "Opened stored body");

        Ok(value.map(|data| StoredBody {
            data,
            chunk_size: self.chunk_size,
        }))
    }

    /// Pull-style view: fetch on first poll, then yield the chunks
    ///
    /// A vanished key yields an empty stream.
    pub fn into_stream(self) -> impl Stream<Item = warnish_store::Result<Bytes>> {
        stream::once(async move { self.open().await })
            .map(|opened| {
                let items: Vec<_> = match opened {
                    Ok(Some(body)) => body.chunks().map(Ok).collect(),
                    Ok(None) => Vec::new(),
                    Err(error) => vec![Err(error)],
                };
                stream::iter(items)
            })
            .flatten()
    }
}

/// A fetched body ready to be replayed
#[derive(Debug, Clone)]
pub struct StoredBody {
    data: Bytes,
    chunk_size: usize,
}

impl StoredBody {
    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the stored body is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The body as ordered slices
    pub fn chunks(&self) -> impl Iterator<Item = Bytes> + '_ {
        (0..self.data.len())
            .step_by(self.chunk_size)
            .map(move |start| {
                let end = (start + self.chunk_size).min(self.data.len());
                self.data.slice(start..end)
            })
    }

    /// Write every chunk into `sink`, then end it
    ///
    /// An empty body ends the sink without writing anything.
    pub async fn pipe_to<S: OutputSink + ?Sized>(self, sink: &mut S) -> Result<usize> {
        let mut written = 0;
        for chunk in self.chunks() {
            written += chunk.len();
            sink.write(chunk).await?;
        }
        sink.end().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use warnish_core::body;
    use warnish_store::InMemoryStore;

    async fn store_with(key: &str, parts: &[&'static [u8]]) -> Arc<dyn CacheStore> {
        let store = InMemoryStore::new();
        let mut parts = parts.iter();
        if let Some(first) = parts.next() {
            store
                .set_ex(key, Bytes::from_static(*first), Duration::from_secs(60))
                .await
                .unwrap();
        }
        for part in parts {
            store.append(key, Bytes::from_static(*part)).await.unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_appended_value_replays_in_order() {
        let store = store_with("k", &[b"hello ", b"brave ", b"world"]).await;
        let opened = StoreStream::new(store, "k", 4).open().await.unwrap().unwrap();

        let chunks: Vec<Bytes> = opened.chunks().collect();
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), b"hello brave world");
    }

    #[tokio::test]
    async fn test_pipe_to_channel() {
        let store = store_with("k", &[b"abc", b"def"]).await;
        let opened = StoreStream::new(store, "k", 2).open().await.unwrap().unwrap();

        let (mut sink, body) = body::channel(8);
        let written = opened.pipe_to(&mut sink).await.unwrap();
        assert_eq!(written, 6);

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"abcdef");
    }

    #[tokio::test]
    async fn test_empty_value_ends_cleanly() {
        let store = store_with("k", &[b""]).await;
        let opened = StoreStream::new(store, "k", 16).open().await.unwrap().unwrap();
        assert!(opened.is_empty());

        let (mut sink, body) = body::channel(1);
        assert_eq!(opened.pipe_to(&mut sink).await.unwrap(), 0);

        let bytes = body.collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryStore::new());
        assert!(StoreStream::new(store.clone(), "nope", 16).open().await.unwrap().is_none());

        let items: Vec<_> = StoreStream::new(store, "nope", 16).into_stream().collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let store = store_with("k", &[b"0123456789"]).await;
        let items: Vec<Bytes> = StoreStream::new(store, "k", 3)
            .into_stream()
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(items.len(), 4);
        assert_eq!(items.concat(), b"0123456789");
    }
}
