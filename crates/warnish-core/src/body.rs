//! Streaming response body

use crate::{ChannelSink, Error, Result};
use bytes::Bytes;
use http_body::Frame;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Body type alias
///
/// Bodies are streamed frame by frame so filters can rewrite them on the fly.
pub type Body = BoxBody<Bytes, Error>;

/// Build a body holding a single buffer
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Build a body with no data
pub fn empty() -> Body {
    full(Bytes::new())
}

/// Create a bounded body channel
///
/// Writes to the returned [`ChannelSink`] become data frames of the returned
/// [`Body`]. A full channel makes the writer wait, which is how a slow client
/// pushes back on whoever is producing the body.
pub fn channel(capacity: usize) -> (ChannelSink, Body) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink::new(tx), ChannelBody { rx }.boxed())
}

/// Body fed by a [`ChannelSink`]
#[derive(Debug)]
pub struct ChannelBody {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl http_body::Body for ChannelBody {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|item| item.map(|chunk| chunk.map(Frame::data)))
    }
}
