//! Error types and error response handling.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use hyper::header;
use tracing::error;

use crate::infra;

/// Errors that can occur while routing or relaying a request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid target url: {0}")]
    InvalidTarget(String),
    #[error("blocked")]
    Blocked,
    #[error("{0}")]
    Upstream(String),
    #[error("invalid redirect location: {0}")]
    InvalidRedirect(String),
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("http builder error: {0}")]
    HttpBuilder(#[from] http::Error),
}

impl ProxyError {
    /// Convert error to appropriate HTTP status code.
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::Blocked => StatusCode::FORBIDDEN,
            ProxyError::Upstream(_)
            | ProxyError::InvalidRedirect(_)
            | ProxyError::TooManyRedirects(_)
            | ProxyError::HttpBuilder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for the error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidTarget(_) => "invalid_target",
            ProxyError::Blocked => "blocked",
            ProxyError::Upstream(_) => "upstream",
            ProxyError::InvalidRedirect(_) => "invalid_redirect",
            ProxyError::TooManyRedirects(_) => "too_many_redirects",
            ProxyError::HttpBuilder(_) => "http_builder",
        }
    }

    /// Convert error to the body returned to the client.
    pub fn to_user_message(&self) -> String {
        match self {
            ProxyError::InvalidTarget(_) => "Bad Request: Invalid URL format".to_string(),
            ProxyError::Blocked => "blocked".to_string(),
            _ => format!("Proxy Error: {}", self),
        }
    }
}

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Build an error response from a ProxyError.
pub fn error_response(error: ProxyError) -> Response<Body> {
    let status = error.to_status_code();
    let message = error.to_user_message();
    infra::metrics::record_error(error.kind());
    if status.is_server_error() {
        error!("Returning error response: {} - {}", status, error);
    }
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from(message))
        .unwrap_or_else(|e| {
            error!("Failed to build error response: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal Server Error"))
                .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
        })
}
