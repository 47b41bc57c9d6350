//! # Warnish Store
//!
//! The key-value store the compression cache persists into. Filters only ever
//! see the [`CacheStore`] trait, which covers the handful of operations the
//! cache needs: existence checks, expiring sets, appends and header hashes.
//!
//! ## Backends
//!
//! - **InMemory**: single-process, used for tests and local development
//! - **Redis**: the production backend, shared across instances
//!
//! ## Example
//!
//! ```rust
//! use warnish_store::{CacheStore, InMemoryStore};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> warnish_store::Result<()> {
//!     let store = InMemoryStore::new();
//!
//!     store.set_ex("warnish-cache:gzip:/", Bytes::from_static(b"\x1f\x8b"), Duration::from_secs(60)).await?;
//!     store.append("warnish-cache:gzip:/", Bytes::from_static(b"\x08")).await?;
//!
//!     assert!(store.exists("warnish-cache:gzip:/").await?);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod backend;
mod config;
mod error;
mod inmemory;

#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use backend::{connect, CacheStore};
pub use config::{RedisConfig, StoreConfig};
pub use error::{Error, Result};
pub use inmemory::InMemoryStore;

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisStore;
