// Response construction helpers that never panic
// A failed builder degrades to a bare 500 instead of unwinding the task

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode};
use hyper::header;
use tracing::error;

/// Build a response with a content type, logging and degrading on builder failure.
pub fn build_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Body>,
) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap_or_else(|e| {
            error!(
                "Failed to build HTTP response: {}. Returning INTERNAL_SERVER_ERROR.",
                e
            );
            internal_error()
        })
}

/// A bodiless redirect to an already validated location.
pub fn redirect_response(status: StatusCode, location: HeaderValue) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response.headers_mut().insert(header::LOCATION, location);
    response
}

fn internal_error() -> Response<Body> {
    let mut response = Response::new(Body::from("Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
