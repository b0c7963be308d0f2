//! HTTP header manipulation for relayed requests and responses.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use hyper::header;

/// Headers removed from every relayed response.
const STRIPPED_RESPONSE_HEADERS: [&str; 5] = [
    "content-security-policy",
    "content-security-policy-report-only",
    "clear-site-data",
    "x-frame-options",
    "x-content-type-options",
];

/// Connection-scoped headers the upstream hop must not leak into ours.
const HOP_BY_HOP_RESPONSE_HEADERS: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "trailer",
    "upgrade",
];

const PREFLIGHT_ALLOW_METHODS: &str = "GET,POST,PUT,PATCH,TRACE,DELETE,HEAD,OPTIONS";
const PREFLIGHT_MAX_AGE: &str = "1728000";

// ============================================================================
// Preflight
// ============================================================================

/// A CORS preflight is an `OPTIONS` carrying `access-control-request-headers`.
pub fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS && headers.contains_key(header::ACCESS_CONTROL_REQUEST_HEADERS)
}

pub fn preflight_response() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    response
}

// ============================================================================
// Request Header Transform
// ============================================================================

/// Prepare inbound headers for forwarding upstream.
///
/// `zh-CN` in `Accept-Language` becomes `zh-SG`; everything else is copied
/// except `Host` and hop-by-hop headers, which belong to the inbound hop.
pub fn transform_request_headers(headers: &mut HeaderMap) {
    if let Some(rewritten) = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.contains("zh-CN"))
        .map(|value| value.replacen("zh-CN", "zh-SG", 1))
        && let Ok(value) = HeaderValue::from_str(&rewritten)
    {
        headers.insert(header::ACCEPT_LANGUAGE, value);
    }

    headers.remove(header::HOST);
    headers.remove("connection");
    headers.remove("keep-alive");
    headers.remove("proxy-authenticate");
    headers.remove("proxy-authorization");
    headers.remove("te");
    headers.remove("trailers");
    headers.remove("upgrade");
}

// ============================================================================
// Response Header Transform
// ============================================================================

/// Open relayed responses to any origin and drop headers that would stop the
/// content from being embedded or read cross-origin, along with the upstream
/// connection's hop-by-hop headers.
pub fn transform_response_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    for name in STRIPPED_RESPONSE_HEADERS
        .iter()
        .chain(HOP_BY_HOP_RESPONSE_HEADERS.iter())
    {
        headers.remove(*name);
    }
}
