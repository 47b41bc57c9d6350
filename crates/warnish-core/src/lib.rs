//! # Warnish Core
//!
//! Foundational abstractions shared by the Warnish filters:
//! - Error types
//! - The streaming response [`Body`]
//! - The [`Middleware`] trait and the [`Next`] chain
//! - The [`OutputSink`] write/end interface used to decorate outgoing bodies

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod body;
pub mod error;
pub mod middleware;
pub mod sink;

pub use body::{Body, ChannelBody};
pub use error::{Error, Result};
pub use middleware::{Middleware, Next, Pipeline};
pub use sink::{ChannelSink, OutputSink};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::body::{self, Body};
    pub use crate::error::{Error, Result};
    pub use crate::middleware::{Middleware, Next, Pipeline};
    pub use crate::sink::{ChannelSink, OutputSink};
}
