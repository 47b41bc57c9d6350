//! The accelerate filter: answer from the cache when an entry exists

use crate::cache::Shared;
use crate::gate::{self, GateDecision};
use crate::headers;
use crate::keys::{request_url, CacheKeys};
use crate::negotiate::negotiate;
use crate::replay::{StoreStream, StoredBody};
use crate::writer::CHANNEL_CAPACITY;
use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use http::{Request, Response, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use warnish_core::middleware::{Middleware, Next};
use warnish_core::{body, Body, Result};

/// A cache entry found for a request
#[derive(Debug)]
struct Hit {
    method: String,
    keys: CacheKeys,
    headers: HashMap<String, String>,
    body: StoredBody,
}

/// Accelerate filter
///
/// Runs before the compress filter. When the negotiated entry for the
/// request exists it replays the stored headers and compressed bytes and
/// never calls the rest of the chain; otherwise it calls through. Store
/// errors on this path count as misses.
pub struct AccelerateMiddleware {
    shared: Arc<Shared>,
}

impl AccelerateMiddleware {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    async fn lookup(&self, method: &str, keys: CacheKeys) -> Option<Hit> {
        let store = &self.shared.store;

        match store.exists(&keys.body).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(key = %keys.body, "cache MISS");
                return None;
            }
            Err(error) => {
                warn!(key = %keys.body, %error, "Cache existence check failed, treating as miss");
                return None;
            }
        }

        let headers = match store.hgetall(&keys.header).await {
            Ok(headers) => headers,
            Err(error) => {
                warn!(key = %keys.header, %error, "Cache header fetch failed, treating as miss");
                return None;
            }
        };

        let stream = StoreStream::new(
            Arc::clone(store),
            keys.body.clone(),
            self.shared.config.codec.chunk_size,
        );
        let body = match stream.open().await {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!(key = %keys.body, "Cache entry expired during lookup");
                return None;
            }
            Err(error) => {
                warn!(key = %keys.body, %error, "Cache body fetch failed, treating as miss");
                return None;
            }
        };

        Some(Hit {
            method: method.to_string(),
            keys,
            headers,
            body,
        })
    }

    fn replay(&self, hit: Hit) -> Result<Response<Body>> {
        debug!(key = %hit.keys.body, len = hit.body.len(), "cache HIT");

        let (mut sink, client_body) = body::channel(CHANNEL_CAPACITY);
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .body(client_body)?;
        let response_headers = response.headers_mut();

        for (name, value) in &hit.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response_headers.insert(name, value);
                }
                _ => trace!(%name, "Skipping unreadable cached header"),
            }
        }

        headers::ensure_vary(response_headers);
        headers::mark_encoded(response_headers, &hit.method);
        headers::stamp_powered_by(response_headers, &self.shared.config.powered_by);

        let body = hit.body;
        tokio::spawn(async move {
            if let Err(error) = body.pipe_to(&mut sink).await {
                debug!(%error, "Cached response not fully delivered");
            }
        });

        Ok(response)
    }
}

#[async_trait]
impl Middleware for AccelerateMiddleware {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        if let GateDecision::PassThrough(reason) = gate::check(req.method(), req.headers(), None) {
            trace!(?reason, "Cache lookup skipped");
            return next.run(req).await;
        }

        let negotiated = gate::accept_encoding(req.headers())
            .and_then(|accept| negotiate(accept, &self.shared.registry))
            .map(|method| method.name().to_string());
        let Some(method) = negotiated else {
            return next.run(req).await;
        };

        let keys = CacheKeys::derive(
            &self.shared.config.prefix,
            Some(method.as_str()),
            request_url(req.uri()),
        );

        match self.lookup(&method, keys).await {
            Some(hit) => self.replay(hit),
            None => next.run(req).await,
        }
    }
}

impl fmt::Debug for AccelerateMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccelerateMiddleware")
            .field("shared", &self.shared)
            .finish()
    }
}
