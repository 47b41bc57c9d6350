//! Eligibility checks shared by both filters

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use http::{HeaderMap, Method};

/// Why a request is left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// The response already carries a non-identity Content-Encoding
    AlreadyEncoded,
    /// The client sent no Accept-Encoding, so identity must be served
    NoAcceptEncoding,
    /// HEAD responses have no body to compress
    HeadRequest,
}

/// Outcome of [`check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Compression and caching may run
    Proceed,
    /// Pass the exchange through untouched
    PassThrough(PassReason),
}

impl GateDecision {
    /// Whether the filters may do any work
    pub fn proceeds(self) -> bool {
        self == GateDecision::Proceed
    }
}

/// Decide whether compression or caching should run at all
///
/// `response_headers` is `None` while no response exists yet. Mutates nothing.
pub fn check(
    method: &Method,
    request_headers: &HeaderMap,
    response_headers: Option<&HeaderMap>,
) -> GateDecision {
    if let Some(headers) = response_headers {
        if let Some(encoding) = headers.get(CONTENT_ENCODING) {
            let is_identity = encoding
                .to_str()
                .map(|e| e.trim().eq_ignore_ascii_case("identity"))
                .unwrap_or(false);
            if !is_identity {
                return GateDecision::PassThrough(PassReason::AlreadyEncoded);
            }
        }
    }

    if accept_encoding(request_headers).is_none() {
        return GateDecision::PassThrough(PassReason::NoAcceptEncoding);
    }

    if method == Method::HEAD {
        return GateDecision::PassThrough(PassReason::HeadRequest);
    }

    GateDecision::Proceed
}

/// The request's Accept-Encoding value; an empty or unreadable one counts as absent
pub fn accept_encoding(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn accepting(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(value));
        headers
    }

    fn encoded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_proceeds() {
        let decision = check(&Method::GET, &accepting("gzip"), Some(&HeaderMap::new()));
        assert!(decision.proceeds());
        assert!(check(&Method::POST, &accepting("gzip"), None).proceeds());
    }

    #[test]
    fn test_already_encoded() {
        assert_eq!(
            check(&Method::GET, &accepting("gzip"), Some(&encoded("br"))),
            GateDecision::PassThrough(PassReason::AlreadyEncoded)
        );
        assert!(check(&Method::GET, &accepting("gzip"), Some(&encoded("identity"))).proceeds());
    }

    #[test]
    fn test_no_accept_encoding() {
        assert_eq!(
            check(&Method::GET, &HeaderMap::new(), None),
            GateDecision::PassThrough(PassReason::NoAcceptEncoding)
        );
        assert_eq!(
            check(&Method::GET, &accepting(""), None),
            GateDecision::PassThrough(PassReason::NoAcceptEncoding)
        );
    }

    #[test]
    fn test_head() {
        assert_eq!(
            check(&Method::HEAD, &accepting("gzip"), None),
            GateDecision::PassThrough(PassReason::HeadRequest)
        );
    }
}
