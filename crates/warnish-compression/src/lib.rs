//! Redis-backed compression + cache middleware for Warnish
//!
//! Two filters that work as a pair in front of an origin handler:
//!
//! - [`CompressMiddleware`] compresses outgoing bodies with the encoding
//!   negotiated from `Accept-Encoding` and persists every compressed chunk,
//!   together with `Content-Type` and `Last-Modified`, into the cache store
//! - [`AccelerateMiddleware`] runs first, finds entries written by the former
//!   and replays them without calling the origin at all
//!
//! Supported encodings out of the box:
//! - gzip
//! - deflate (zlib framing, as HTTP expects)
//!
//! ```no_run
//! use warnish_compression::{CacheConfig, Warnish};
//! use warnish_core::{body, Pipeline, Response};
//! use warnish_core::middleware::handler_fn;
//!
//! # async fn run() -> warnish_core::Result<()> {
//! let warnish = Warnish::builder(CacheConfig::default()).build().await?;
//! let pipeline = Pipeline::new(
//!     warnish.layers(),
//!     handler_fn(|_req| async { Ok(Response::new(body::full("hello world"))) }),
//! );
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod gate;
pub mod headers;
pub mod keys;
pub mod loader;
pub mod negotiate;
pub mod persist;
pub mod reader;
pub mod replay;
pub mod sink;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{Warnish, WarnishBuilder};
pub use codec::{Codec, CodecOptions, CompressionMethod, MethodRegistry, Strategy};
pub use config::CacheConfig;
pub use keys::CacheKeys;
pub use negotiate::negotiate;
pub use reader::AccelerateMiddleware;
pub use replay::StoreStream;
pub use writer::{CompressMiddleware, RequestHead, ResponseFilter};
