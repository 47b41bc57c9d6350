//! Output sinks
//!
//! An [`OutputSink`] is the write/end side of a response body. Filters that
//! rewrite a body wrap the sink they were handed in one of their own and pass
//! the wrapper on, instead of patching the response in place.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Incremental writer for an outgoing body
#[async_trait]
pub trait OutputSink: Send {
    /// Write one chunk of the body
    ///
    /// Returns [`Error::ClientDisconnected`] once nobody is reading anymore.
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Signal that the body is complete
    async fn end(&mut self) -> Result<()>;

    /// Terminate the body with an error instead of ending it cleanly
    async fn abort(&mut self, error: Error) {
        let _ = error;
    }
}

/// Sink that feeds a [`ChannelBody`](crate::ChannelBody)
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Result<Bytes>>>,
}

impl ChannelSink {
    pub(crate) fn new(tx: mpsc::Sender<Result<Bytes>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Whether the reading side has gone away or the body has ended
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let tx = self.tx.as_ref().ok_or(Error::ClientDisconnected)?;
        tx.send(Ok(chunk))
            .await
            .map_err(|_| Error::ClientDisconnected)
    }

    async fn end(&mut self) -> Result<()> {
        // Dropping the sender closes the body after the buffered frames.
        self.tx.take();
        Ok(())
    }

    async fn abort(&mut self, error: Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_write_after_end_fails() {
        let (mut sink, _body) = body::channel(1);
        sink.end().await.unwrap();

        assert!(sink.is_closed());
        let err = sink.write(Bytes::from_static(b"late")).await.unwrap_err();
        assert!(matches!(err, Error::ClientDisconnected));
    }

    #[tokio::test]
    async fn test_write_to_dropped_body_fails() {
        let (mut sink, body) = body::channel(1);
        drop(body);

        let err = sink.write(Bytes::from_static(b"data")).await.unwrap_err();
        assert!(matches!(err, Error::ClientDisconnected));
    }

    #[tokio::test]
    async fn test_empty_chunks_are_skipped() {
        let (mut sink, body) = body::channel(1);
        sink.write(Bytes::new()).await.unwrap();
        sink.write(Bytes::from_static(b"x")).await.unwrap();
        sink.end().await.unwrap();

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from_static(b"x"));
    }
}
