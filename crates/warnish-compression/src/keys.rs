//! Cache key derivation

use http::Uri;

/// Method segment used when no encoding was negotiated
pub const IDENTITY: &str = "identity";

/// The pair of store keys for one cache entry
///
/// Both keys come out of [`CacheKeys::derive`] together, so the body and its
/// header record can never drift apart. The HTTP verb is deliberately not part
/// of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeys {
    /// Key of the compressed body
    pub body: String,
    /// Key of the header record
    pub header: String,
}

impl CacheKeys {
    /// Derive both keys from the namespace prefix, negotiated method and URL
    pub fn derive(prefix: &str, method: Option<&str>, url: &str) -> Self {
        let method = method.unwrap_or(IDENTITY);
        Self {
            body: format!("{prefix}-cache:{method}:{url}"),
            header: format!("{prefix}-headers:{method}:{url}"),
        }
    }
}

/// Path and query of a request URI, the URL part of a cache key
pub fn request_url(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
}
