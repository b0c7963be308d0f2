use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use hyper::header;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use crate::utils::errors::build_response;

const LANDING_HTML: &str = include_str!("../../assets/index.html");
const DECOY_HTML: &str = include_str!("../../assets/nginx.html");
const FAVICON_PNG: &[u8] = include_bytes!("../../assets/favicon.png");

const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

static LANDING_ETAG: OnceLock<String> = OnceLock::new();

fn landing_etag() -> &'static str {
    LANDING_ETAG.get_or_init(|| {
        let mut hasher = DefaultHasher::new();
        LANDING_HTML.hash(&mut hasher);
        format!("\"{}\"", hasher.finish())
    })
}

/// The paste-a-link interface shown when nothing else matched.
pub fn landing_page() -> Response<Body> {
    let mut response = build_response(StatusCode::OK, HTML_CONTENT_TYPE, LANDING_HTML);
    if let Ok(etag) = landing_etag().parse() {
        response.headers_mut().insert(header::ETAG, etag);
    }
    response
}

/// Stock web-server welcome page served to blocked crawlers.
pub fn decoy_page() -> Response<Body> {
    build_response(StatusCode::OK, HTML_CONTENT_TYPE, DECOY_HTML)
}

pub fn favicon() -> Response<Body> {
    let mut response = build_response(StatusCode::OK, "image/png", FAVICON_PNG);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=86400"),
    );
    response
}
