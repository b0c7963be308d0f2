/// Inbound request inspection
/// Works out who is asking and which origin they reached this relay through
use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{Request, connect_info::ConnectInfo};
use hyper::header;

/// Extract client IP for logging.
/// Priority order:
/// 1. cf-connecting-ip
/// 2. X-Forwarded-For (first parseable entry)
/// 3. X-Real-IP
/// 4. Connection info
pub fn extract_client_ip(req: &Request<Body>) -> Option<String> {
    if let Some(cf) = req.headers().get("cf-connecting-ip")
        && let Ok(ip) = cf.to_str()
        && let Some(addr) = parse_ip_literal(ip)
    {
        return Some(addr.to_string());
    }

    if let Some(xff) = req.headers().get("x-forwarded-for")
        && let Ok(xff_str) = xff.to_str()
        && let Some(ip) = xff_str.split(',').find_map(parse_ip_literal)
    {
        return Some(ip.to_string());
    }

    if let Some(xri) = req.headers().get("x-real-ip")
        && let Ok(ip) = xri.to_str()
        && let Some(addr) = parse_ip_literal(ip)
    {
        return Some(addr.to_string());
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Detect the scheme the client used to reach us.
/// Priority order:
/// 1. cf-visitor header ({"scheme":"https"})
/// 2. X-Forwarded-Proto header
/// 3. URI scheme (absolute-form requests)
/// 4. Host heuristics for local development, otherwise https
pub fn detect_client_protocol(req: &Request<Body>) -> &'static str {
    if let Some(cf_visitor) = req.headers().get("cf-visitor")
        && let Ok(visitor_str) = cf_visitor.to_str()
    {
        if visitor_str.contains("\"scheme\":\"https\"") {
            return "https";
        } else if visitor_str.contains("\"scheme\":\"http\"") {
            return "http";
        }
    }

    if let Some(forwarded) = req.headers().get("x-forwarded-proto")
        && let Ok(proto) = forwarded.to_str()
    {
        match proto.trim().to_ascii_lowercase().as_str() {
            "https" => return "https",
            "http" => return "http",
            _ => {}
        }
    }

    if let Some(scheme) = req.uri().scheme_str() {
        if scheme.eq_ignore_ascii_case("https") {
            return "https";
        } else if scheme.eq_ignore_ascii_case("http") {
            return "http";
        }
    }

    let host = request_host(req);
    if host.starts_with("localhost") || host.starts_with("127.0.0.1") || host.starts_with("[::1]")
    {
        return "http";
    }

    "https"
}

/// Host the client addressed, from the Host header or an absolute-form URI.
pub fn request_host(req: &Request<Body>) -> String {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// `scheme://host` of this relay as seen by the client.
pub fn relay_origin(req: &Request<Body>) -> String {
    format!("{}://{}", detect_client_protocol(req), request_host(req))
}

fn parse_ip_literal(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }

    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr.ip());
    }

    None
}
