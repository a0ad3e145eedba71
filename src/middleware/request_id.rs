//! Request ID middleware for tracing, plus client context capture.

use axum::{
    extract::{ConnectInfo, Request},
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::audit::RequestMeta;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub static CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");
static FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");
static REAL_IP_HEADER: HeaderName = HeaderName::from_static("x-real-ip");

#[derive(Debug, Clone)]
pub struct RequestId(pub Arc<str>);

impl RequestId {
    pub fn new() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = extract_or_generate_request_id(&request);
    let meta = extract_request_meta(&request);

    request.extensions_mut().insert(request_id.clone());
    request.extensions_mut().insert(meta.clone());

    let method = request.method().clone();
    let uri = request.uri().clone();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
        client_ip = %meta.ip_address,
    );

    let response = next.run(request).instrument(span).await;

    add_request_id_to_response(response, &request_id)
}

fn extract_or_generate_request_id(request: &Request) -> RequestId {
    if let Some(id) = request.headers().get(&REQUEST_ID_HEADER) {
        if let Ok(id_str) = id.to_str() {
            if is_valid_request_id(id_str) {
                return RequestId::from_string(id_str);
            }
        }
    }

    if let Some(id) = request.headers().get(&CORRELATION_ID_HEADER) {
        if let Ok(id_str) = id.to_str() {
            if is_valid_request_id(id_str) {
                return RequestId::from_string(id_str);
            }
        }
    }

    RequestId::new()
}

/// Captures the client IP and user agent for audit entries. Proxy headers
/// win over the socket address; anything unresolvable becomes "unknown"
/// rather than an absent field.
fn extract_request_meta(request: &Request) -> RequestMeta {
    let ip_address = request
        .headers()
        .get(&FORWARDED_FOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            request
                .headers()
                .get(&REAL_IP_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    RequestMeta {
        ip_address,
        user_agent,
    }
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn add_request_id_to_response(mut response: Response, request_id: &RequestId) -> Response {
    if let Ok(header_value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), header_value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1.as_str(), id2.as_str());
    }

    #[test]
    fn test_request_id_from_string() {
        let id = RequestId::from_string("test-request-id-123");
        assert_eq!(id.as_str(), "test-request-id-123");
    }

    #[test]
    fn test_valid_request_id() {
        assert!(is_valid_request_id("abc123"));
        assert!(is_valid_request_id("abc-123"));
        assert!(is_valid_request_id("abc_123"));
        assert!(is_valid_request_id("a".repeat(128).as_str()));
    }

    #[test]
    fn test_invalid_request_id() {
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("abc 123"));
        assert!(!is_valid_request_id("abc@123"));
        assert!(!is_valid_request_id("a".repeat(129).as_str()));
    }

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        let meta = extract_request_meta(&request);
        assert_eq!(meta.ip_address, "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let request = axum::http::Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        let meta = extract_request_meta(&request);
        assert_eq!(meta.ip_address, "198.51.100.2");
    }

    #[test]
    fn test_unknown_fallbacks() {
        let request = axum::http::Request::builder().body(Body::empty()).unwrap();
        let meta = extract_request_meta(&request);
        assert_eq!(meta.ip_address, "unknown");
        assert_eq!(meta.user_agent, "unknown");
    }

    #[test]
    fn test_user_agent_captured() {
        let request = axum::http::Request::builder()
            .header("user-agent", "convoy-test/1.0")
            .body(Body::empty())
            .unwrap();
        let meta = extract_request_meta(&request);
        assert_eq!(meta.user_agent, "convoy-test/1.0");
    }
}
