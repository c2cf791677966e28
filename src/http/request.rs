//! Request handling.
//!
//! # Responsibilities
//! - Name the request-id header and read it back from a request
//! - Derive the dispatcher's inbound context from the HTTP request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - The deadline starts when the handler starts, not when bytes arrived

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderName};

use crate::rpc::InboundContext;

/// Header carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request-id header as a typed name.
pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(X_REQUEST_ID)
}

/// The request id, when present and valid ASCII.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Build the inbound context for an rpc call carried by this request.
pub fn inbound_context(headers: &HeaderMap, timeout: Option<Duration>) -> InboundContext {
    let mut inbound = InboundContext::new();
    if let Some(id) = request_id(headers) {
        inbound = inbound.with_request_id(id);
    }
    if let Some(timeout) = timeout {
        inbound = inbound.with_deadline(Instant::now() + timeout);
    }
    inbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_inbound_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(request_id_header(), HeaderValue::from_static("abc-123"));

        let inbound = inbound_context(&headers, Some(Duration::from_secs(5)));
        assert_eq!(inbound.request_id(), Some("abc-123"));
        assert!(inbound.deadline().unwrap() > Instant::now());
    }

    #[test]
    fn test_inbound_context_without_headers() {
        let inbound = inbound_context(&HeaderMap::new(), None);
        assert_eq!(inbound.request_id(), None);
        assert!(inbound.deadline().is_none());
    }
}
