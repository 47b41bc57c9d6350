//! The compress filter: compress on the fly and persist into the cache

use crate::cache::Shared;
use crate::codec::CompressionMethod;
use crate::gate::{self, GateDecision};
use crate::headers;
use crate::keys::{request_url, CacheKeys};
use crate::negotiate::negotiate;
use crate::persist::CachePersistence;
use crate::sink::{CachingSink, CompressingSink};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::response::Parts;
use http::{HeaderMap, Method, Request, Response, Uri};
use http_body_util::BodyExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use warnish_core::middleware::{Middleware, Next};
use warnish_core::{body, Body, Error, OutputSink, Result};

/// Frames buffered between the compressor and the client
pub const CHANNEL_CAPACITY: usize = 16;

/// What the filter keeps of the request once it has been handed downstream
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
}

impl RequestHead {
    fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        }
    }
}

/// Predicate deciding whether a response may be compressed at all
pub type ResponseFilter = Arc<dyn Fn(&RequestHead, &Parts) -> bool + Send + Sync>;

/// Compress filter
///
/// Calls the origin handler, then rewrites its response: the header
/// rules run once before the first body byte, and the body is re-streamed
/// through the negotiated codec while every compressed chunk is persisted.
pub struct CompressMiddleware {
    shared: Arc<Shared>,
    filter: Option<ResponseFilter>,
}

impl CompressMiddleware {
    pub(crate) fn new(shared: Arc<Shared>, filter: Option<ResponseFilter>) -> Self {
        Self { shared, filter }
    }

    /// Pre-send stage, run exactly once per response
    ///
    /// Applies the header rules and returns the negotiated method, or `None`
    /// when the body must pass through untouched.
    fn prepare(&self, head: &RequestHead, parts: &mut Parts) -> Option<CompressionMethod> {
        let decision = gate::check(&head.method, &head.headers, Some(&parts.headers));
        if let GateDecision::PassThrough(reason) = decision {
            trace!(?reason, "Compression skipped");
            return None;
        }

        headers::ensure_vary(&mut parts.headers);
        headers::compose_powered_by(&mut parts.headers, &self.shared.config.powered_by);

        if let Some(filter) = &self.filter {
            if !filter(head, parts) {
                trace!("Compression skipped by filter");
                return None;
            }
        }

        let accept = gate::accept_encoding(&head.headers)?;
        let method = negotiate(accept, &self.shared.registry)?.clone();

        headers::mark_encoded(&mut parts.headers, method.name());

        Some(method)
    }

    fn persistence(
        &self,
        head: &RequestHead,
        method: &CompressionMethod,
        parts: &Parts,
    ) -> Option<CachePersistence> {
        if self.shared.is_ignored_verb(&head.method) {
            trace!(method = %head.method, "Verb ignored, response not cached");
            return None;
        }

        let keys = CacheKeys::derive(
            &self.shared.config.prefix,
            Some(method.name()),
            request_url(&head.uri),
        );
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        debug!(key = %keys.body, "Saving compressed response into cache");

        Some(CachePersistence::new(
            Arc::clone(&self.shared.store),
            keys,
            self.shared.config.cache_expires(),
            content_type,
        ))
    }
}

#[async_trait]
impl Middleware for CompressMiddleware {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        let head = RequestHead::from_request(&req);

        let response = next.run(req).await?;
        let (mut parts, origin) = response.into_parts();

        let Some(method) = self.prepare(&head, &mut parts) else {
            return Ok(Response::from_parts(parts, origin));
        };

        let options = &self.shared.config.codec;
        let (client, client_body) = body::channel(CHANNEL_CAPACITY);
        let sink = CompressingSink::new(
            method.codec(options),
            options.chunk_size,
            CachingSink::new(self.persistence(&head, &method, &parts), client),
        );

        tokio::spawn(pump(origin, sink));

        Ok(Response::from_parts(parts, client_body))
    }
}

/// Drive the origin body through `sink`
async fn pump<S: OutputSink>(mut origin: Body, mut sink: S) {
    while let Some(frame) = origin.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "Origin body failed, aborting response");
                sink.abort(Error::Origin(error.to_string())).await;
                return;
            }
        };

        let Ok(data) = frame.into_data() else {
            continue;
        };

        if let Err(error) = sink.write(data).await {
            match error {
                Error::ClientDisconnected => debug!("Client went away, stopping compression"),
                error => {
                    warn!(%error, "Compression failed, aborting response");
                    sink.abort(error).await;
                }
            }
            return;
        }
    }

    if let Err(error) = sink.end().await {
        debug!(%error, "Failed to finish compressed response");
    }
}

impl fmt::Debug for CompressMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressMiddleware")
            .field("shared", &self.shared)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}
