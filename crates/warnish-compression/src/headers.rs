//! Response header rules shared by the writer and the reader

use http::header::{HeaderName, CONTENT_ENCODING, CONTENT_LENGTH, VARY};
use http::{HeaderMap, HeaderValue};

/// `X-Powered-By`
pub static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

const ACCEPT_ENCODING_TOKEN: &str = "Accept-Encoding";

/// Make sure `Vary` names Accept-Encoding
pub fn ensure_vary(headers: &mut HeaderMap) {
    let current: Vec<&str> = headers
        .get_all(VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if current.is_empty() {
        headers.insert(VARY, HeaderValue::from_static(ACCEPT_ENCODING_TOKEN));
        return;
    }

    let joined = current.join(", ");
    let lowered = joined.to_ascii_lowercase();
    if lowered.contains("accept-encoding") || joined.trim() == "*" {
        return;
    }

    if let Ok(value) = HeaderValue::from_str(&format!("{joined}, {ACCEPT_ENCODING_TOKEN}")) {
        headers.insert(VARY, value);
    }
}

/// Add `marker` to `X-Powered-By`, keeping whatever is already there
pub fn compose_powered_by(headers: &mut HeaderMap, marker: &str) {
    let existing = headers
        .get(&X_POWERED_BY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let value = match existing {
        Some(existing) if existing.split(',').any(|part| part.trim() == marker) => return,
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {marker}"),
        _ => marker.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_POWERED_BY.clone(), value);
    }
}

/// Set `X-Powered-By` to `marker`, replacing any previous value
pub fn stamp_powered_by(headers: &mut HeaderMap, marker: &str) {
    if let Ok(value) = HeaderValue::from_str(marker) {
        headers.insert(X_POWERED_BY.clone(), value);
    }
}

/// Declare the body as encoded with `method`
///
/// The length of the encoded body is unknown up front, so any
/// Content-Length is dropped.
pub fn mark_encoded(headers: &mut HeaderMap, method: &str) {
    if let Ok(value) = HeaderValue::from_str(method) {
        headers.insert(CONTENT_ENCODING, value);
    }
    headers.remove(CONTENT_LENGTH);
}
