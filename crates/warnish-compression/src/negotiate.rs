//! Accept-Encoding negotiation

use crate::codec::{CompressionMethod, MethodRegistry};

/// Method used when the client accepts anything
pub const WILDCARD_METHOD: &str = "gzip";

/// Pick a compression method for an `Accept-Encoding` value
///
/// `*` selects gzip. Anything else selects the first registered method whose
/// name occurs anywhere in the header; quality values are not parsed, so
/// `gzip;q=0` still counts as gzip. `None` means identity.
pub fn negotiate<'a>(accept: &str, registry: &'a MethodRegistry) -> Option<&'a CompressionMethod> {
    if accept.trim() == "*" {
        return registry.get(WILDCARD_METHOD);
    }

    registry.iter().find(|method| accept.contains(method.name()))
}
