//! Sink decorators used by the compress filter
//!
//! The origin body is pumped through `CompressingSink -> CachingSink ->`
//! the client sink. Each layer only sees `write`/`end`.

use crate::codec::Codec;
use crate::persist::CachePersistence;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use tracing::debug;
use warnish_core::{Error, OutputSink, Result};

/// Compresses everything written to it before handing it on
pub struct CompressingSink<S> {
    codec: Option<Box<dyn Codec>>,
    chunk_size: usize,
    inner: S,
}

impl<S: OutputSink> CompressingSink<S> {
    /// Wrap `inner`, emitting compressed chunks of at most `chunk_size` bytes
    pub fn new(codec: Box<dyn Codec>, chunk_size: usize, inner: S) -> Self {
        Self {
            codec: Some(codec),
            chunk_size: chunk_size.max(1),
            inner,
        }
    }

    async fn emit(&mut self, output: Bytes) -> Result<()> {
        let mut offset = 0;
        while offset < output.len() {
            let end = (offset + self.chunk_size).min(output.len());
            self.inner.write(output.slice(offset..end)).await?;
            offset = end;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: OutputSink> OutputSink for CompressingSink<S> {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let codec = self
            .codec
            .as_mut()
            .ok_or_else(|| Error::Compression("write after end".to_string()))?;
        let output = codec
            .write(&chunk)
            .map_err(|e| Error::Compression(e.to_string()))?;
        self.emit(output).await
    }

    async fn end(&mut self) -> Result<()> {
        if let Some(codec) = self.codec.take() {
            let trailer = codec
                .finish()
                .map_err(|e| Error::Compression(e.to_string()))?;
            self.emit(trailer).await?;
        }
        self.inner.end().await
    }

    async fn abort(&mut self, error: Error) {
        self.codec.take();
        self.inner.abort(error).await;
    }
}

impl<S> fmt::Debug for CompressingSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressingSink")
            .field("chunk_size", &self.chunk_size)
            .field("finished", &self.codec.is_none())
            .finish_non_exhaustive()
    }
}

/// Persists every chunk before forwarding it
///
/// Without persistence (ignored verbs) chunks go straight through. Store
/// failures are absorbed by [`CachePersistence`] and never stop a chunk.
///
/// With persistence, a client that goes away only stops the forwarding: the
/// rest of the body is still written to the cache, so the entry ends up
/// complete instead of holding a cut-off stream.
#[derive(Debug)]
pub struct CachingSink<S> {
    persistence: Option<CachePersistence>,
    inner: S,
    client_gone: bool,
}

impl<S: OutputSink> CachingSink<S> {
    /// Wrap `inner`
    pub fn new(persistence: Option<CachePersistence>, inner: S) -> Self {
        Self {
            persistence,
            inner,
            client_gone: false,
        }
    }
}

#[async_trait]
impl<S: OutputSink> OutputSink for CachingSink<S> {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return self.inner.write(chunk).await;
        };

        persistence.persist(&chunk).await;
        if self.client_gone {
            return Ok(());
        }

        match self.inner.write(chunk).await {
            Err(Error::ClientDisconnected) => {
                debug!(
                    key = %persistence.keys().body,
                    "Client went away, finishing cache entry without it"
                );
                self.client_gone = true;
                Ok(())
            }
            result => result,
        }
    }

    async fn end(&mut self) -> Result<()> {
        self.inner.end().await
    }

    async fn abort(&mut self, error: Error) {
        self.inner.abort(error).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{gzip, CodecOptions};
    use crate::keys::CacheKeys;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::sync::Arc;
    use std::time::Duration;
    use warnish_store::{CacheStore, InMemoryStore};

    /// Collects everything in memory
    #[derive(Debug, Default)]
    struct VecSink {
        chunks: Vec<Bytes>,
        ended: bool,
    }

    #[async_trait]
    impl OutputSink for VecSink {
        async fn write(&mut self, chunk: Bytes) -> Result<()> {
            self.chunks.push(chunk);
            Ok(())
        }

        async fn end(&mut self) -> Result<()> {
            self.ended = true;
            Ok(())
        }
    }

    fn gunzip(chunks: &[Bytes]) -> String {
        let compressed: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        let mut out = String::new();
        GzDecoder::new(&compressed[..]).read_to_string(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_compressing_sink_respects_chunk_size() {
        let options = CodecOptions {
            level: 0,
            chunk_size: 64,
            ..Default::default()
        };
        let mut sink = CompressingSink::new(gzip(&options), options.chunk_size, VecSink::default());

        let data = "0123456789".repeat(100);
        sink.write(Bytes::from(data.clone())).await.unwrap();
        sink.end().await.unwrap();

        assert!(sink.inner.ended);
        assert!(sink.inner.chunks.len() > 1);
        assert!(sink.inner.chunks.iter().all(|c| c.len() <= 64));
        assert_eq!(gunzip(&sink.inner.chunks), data);
    }

    #[tokio::test]
    async fn test_write_after_end_fails() {
        let options = CodecOptions::default();
        let mut sink = CompressingSink::new(gzip(&options), options.chunk_size, VecSink::default());
        sink.end().await.unwrap();

        assert!(sink.write(Bytes::from_static(b"late")).await.is_err());
    }

    #[tokio::test]
    async fn test_caching_sink_persists_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let keys = CacheKeys::derive("warnish", Some("gzip"), "/");
        let persistence =
            CachePersistence::new(store.clone(), keys.clone(), Duration::from_secs(60), None);
        let mut sink = CachingSink::new(Some(persistence), VecSink::default());

        sink.write(Bytes::from_static(b"one,")).await.unwrap();
        sink.write(Bytes::from_static(b"two")).await.unwrap();
        sink.end().await.unwrap();

        assert_eq!(sink.inner.chunks.len(), 2);
        assert_eq!(
            store.get(&keys.body).await.unwrap(),
            Some(Bytes::from_static(b"one,two"))
        );
    }

    /// Sink whose reader has already gone away
    #[derive(Debug, Default)]
    struct ClosedSink {
        attempts: usize,
    }

    #[async_trait]
    impl OutputSink for ClosedSink {
        async fn write(&mut self, _chunk: Bytes) -> Result<()> {
            self.attempts += 1;
            Err(Error::ClientDisconnected)
        }

        async fn end(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_caching_sink_outlives_client() {
        let store = Arc::new(InMemoryStore::new());
        let keys = CacheKeys::derive("warnish", Some("gzip"), "/gone");
        let persistence =
            CachePersistence::new(store.clone(), keys.clone(), Duration::from_secs(60), None);
        let mut sink = CachingSink::new(Some(persistence), ClosedSink::default());

        sink.write(Bytes::from_static(b"one,")).await.unwrap();
        sink.write(Bytes::from_static(b"two,")).await.unwrap();
        sink.write(Bytes::from_static(b"three")).await.unwrap();
        sink.end().await.unwrap();

        assert_eq!(sink.inner.attempts, 1);
        assert_eq!(
            store.get(&keys.body).await.unwrap(),
            Some(Bytes::from_static(b"one,two,three"))
        );
    }

    #[tokio::test]
    async fn test_uncached_sink_reports_disconnect() {
        let mut sink = CachingSink::new(None, ClosedSink::default());
        assert!(matches!(
            sink.write(Bytes::from_static(b"data")).await,
            Err(Error::ClientDisconnected)
        ));
    }

    #[tokio::test]
    async fn test_caching_sink_without_persistence() {
        let mut sink = CachingSink::new(None, VecSink::default());
        sink.write(Bytes::from_static(b"data")).await.unwrap();
        sink.end().await.unwrap();

        assert_eq!(sink.inner.chunks, vec![Bytes::from_static(b"data")]);
        assert!(sink.inner.ended);
    }
}
