//! Outbound fetch loop: relay, rewrite redirects, follow foreign ones.

use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use futures_util::StreamExt;
use hyper::header;
use tracing::{debug, info};

use crate::errors::{ProxyError, ProxyResult};
use crate::infra;
use crate::proxy::headers::transform_response_headers;
use crate::proxy::redirect::{self, RedirectDecision};
use crate::proxy::stream::ProxyBodyStream;
use crate::services::client::Upstream;

/// How upstream redirects are handled for the next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Inspect every `location` and decide per redirect.
    Manual,
    /// Chase 3xx responses transparently, the way a fetch layer would.
    Follow,
}

/// One outbound hop: method, headers and body, plus the redirect mode.
pub struct ProxyRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Body,
    pub redirect: RedirectMode,
}

impl ProxyRequest {
    pub fn new(method: Method, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            headers,
            body,
            redirect: RedirectMode::Manual,
        }
    }

    /// Derive the request for the hop after a `status` redirect from `from`
    /// to `to`.
    ///
    /// The body has already been sent, so the next hop carries none. A 303,
    /// or a 301/302 answering a POST, turns into a GET. Credentials never
    /// leave the origin they were sent to.
    pub fn follow_hop(&self, status: StatusCode, from: &Uri, to: &Uri) -> ProxyRequest {
        let becomes_get = (status == StatusCode::SEE_OTHER && self.method != Method::HEAD)
            || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
                && self.method == Method::POST);
        let method = if becomes_get {
            Method::GET
        } else {
            self.method.clone()
        };

        let mut headers = self.headers.clone();
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        if becomes_get {
            headers.remove(header::CONTENT_TYPE);
        }
        if !same_origin(from, to) {
            headers.remove(header::AUTHORIZATION);
            headers.remove(header::COOKIE);
            headers.remove(header::PROXY_AUTHORIZATION);
        }

        ProxyRequest {
            method,
            headers,
            body: Body::empty(),
            redirect: RedirectMode::Follow,
        }
    }
}

fn effective_port(uri: &Uri) -> Option<u16> {
    uri.port_u16().or(match uri.scheme_str() {
        Some(s) if s.eq_ignore_ascii_case("http") => Some(80),
        Some(s) if s.eq_ignore_ascii_case("https") => Some(443),
        _ => None,
    })
}

fn same_origin(a: &Uri, b: &Uri) -> bool {
    let scheme_eq = match (a.scheme_str(), b.scheme_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    };
    let host_eq = match (a.host(), b.host()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    };
    scheme_eq && host_eq && effective_port(a) == effective_port(b)
}

fn is_followable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Relay `request` to `target` and return the client-facing response.
///
/// GitHub-shaped redirects are rewritten to `relay_base` so the client comes
/// back through this service. Any other redirect is chased here, at most
/// `max_redirects` times. The upstream body is streamed, never buffered.
pub async fn proxy_request(
    upstream: &dyn Upstream,
    target: Uri,
    request: ProxyRequest,
    relay_base: &str,
    max_redirects: usize,
) -> ProxyResult<Response<Body>> {
    let start = Instant::now();
    let mut current = target;
    let mut request = request;
    let mut hops = 0usize;

    loop {
        debug!(
            "Upstream hop {} ({:?}): {} {}",
            hops, request.redirect, request.method, current
        );
        let ProxyRequest {
            method,
            headers,
            body,
            redirect: mode,
        } = request;
        let mut outbound = Request::builder()
            .method(method.clone())
            .uri(current.clone())
            .body(body)?;
        *outbound.headers_mut() = headers.clone();

        let response = upstream
            .send(outbound)
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;
        let (mut parts, upstream_body) = response.into_parts();

        let location = parts
            .headers
            .get(header::LOCATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        if let Some(location) = location {
            let decision = if mode == RedirectMode::Follow && is_followable(parts.status) {
                let absolute = redirect::resolve_location(&location, &current)?;
                let next = absolute
                    .parse::<Uri>()
                    .map_err(|_| ProxyError::InvalidRedirect(absolute.clone()))?;
                RedirectDecision::FollowForeignRedirect(next)
            } else {
                redirect::decide(&location, &current, relay_base)?
            };

            match decision {
                RedirectDecision::Loopback(value) => {
                    debug!("Rewriting redirect to loop back: {:?}", value);
                    infra::metrics::LOOPBACK_REWRITES_TOTAL.inc();
                    parts.headers.insert(header::LOCATION, value);
                }
                RedirectDecision::FollowForeignRedirect(next) => {
                    hops += 1;
                    if hops > max_redirects {
                        return Err(ProxyError::TooManyRedirects(max_redirects));
                    }
                    info!("Following redirect {} -> {}", current, next);
                    infra::metrics::REDIRECTS_FOLLOWED_TOTAL.inc();
                    let previous = ProxyRequest {
                        method,
                        headers,
                        body: Body::empty(),
                        redirect: mode,
                    };
                    request = previous.follow_hop(parts.status, &current, &next);
                    current = next;
                    continue;
                }
            }
        }

        transform_response_headers(&mut parts.headers);
        let stream = ProxyBodyStream::new(upstream_body.into_data_stream().boxed(), start);
        return Ok(Response::from_parts(parts, Body::from_stream(stream)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::client::testing::{Canned, MockUpstream};
    use http_body_util::BodyExt;

    const RELAY: &str = "https://relay.example/";

    fn get() -> ProxyRequest {
        ProxyRequest::new(Method::GET, HeaderMap::new(), Body::empty())
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_relays_status_headers_and_body() {
        let upstream = MockUpstream::new(vec![Canned::Respond {
            status: StatusCode::PARTIAL_CONTENT,
            headers: vec![
                ("content-security-policy", "default-src 'none'".to_string()),
                ("x-frame-options", "deny".to_string()),
                ("etag", "\"v1\"".to_string()),
            ],
            body: "payload",
        }]);
        let target = Uri::from_static("https://github.com/a/b/archive/main.zip");

        let response = proxy_request(&upstream, target.clone(), get(), RELAY, 10)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], "*");
        assert!(!headers.contains_key("content-security-policy"));
        assert!(!headers.contains_key("x-frame-options"));
        assert_eq!(headers[header::ETAG], "\"v1\"");
        assert_eq!(body_string(response).await, "payload");

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].uri, target);
    }

    #[tokio::test]
    async fn test_upstream_error_statuses_pass_through() {
        let upstream = MockUpstream::new(vec![Canned::Respond {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
            body: "Not Found",
        }]);
        let target = Uri::from_static("https://github.com/a/b/releases/download/v9/x.zip");
        let response = proxy_request(&upstream, target, get(), RELAY, 10)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Not Found");
    }

    #[tokio::test]
    async fn test_github_redirect_is_looped_back_not_followed() {
        let upstream = MockUpstream::new(vec![Canned::redirect(
            StatusCode::FOUND,
            "https://github.com/a/b/archive/refs/heads/main.zip",
        )]);
        let target = Uri::from_static("https://github.com/a/b/archive/main.zip");

        let response = proxy_request(&upstream, target, get(), RELAY, 10)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://relay.example/github.com/a/b/archive/refs/heads/main.zip"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(upstream.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_redirect_is_followed_to_the_end() {
        let upstream = MockUpstream::new(vec![
            Canned::redirect(
                StatusCode::FOUND,
                "https://objects.githubusercontent.com/asset/1?sig=x",
            ),
            // In follow mode even a GitHub-shaped hop is chased.
            Canned::redirect(
                StatusCode::TEMPORARY_REDIRECT,
                "https://github.com/a/b/releases/download/v1/mirror.zip",
            ),
            Canned::ok("binary"),
        ]);
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, "bytes=0-5".parse().unwrap());
        let request = ProxyRequest::new(Method::GET, headers, Body::empty());
        let target = Uri::from_static("https://github.com/a/b/releases/download/v1/x.zip");

        let response = proxy_request(&upstream, target, request, RELAY, 10)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(header::LOCATION));
        assert_eq!(body_string(response).await, "binary");

        let requests = upstream.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[1].uri,
            Uri::from_static("https://objects.githubusercontent.com/asset/1?sig=x")
        );
        assert_eq!(
            requests[2].uri,
            Uri::from_static("https://github.com/a/b/releases/download/v1/mirror.zip")
        );
        assert!(requests.iter().all(|r| r.headers[header::RANGE] == "bytes=0-5"));
    }

    #[tokio::test]
    async fn test_credentials_dropped_once_redirect_leaves_origin() {
        let upstream = MockUpstream::new(vec![
            Canned::redirect(
                StatusCode::FOUND,
                "https://objects.githubusercontent.com/asset/1?sig=x",
            ),
            Canned::redirect(StatusCode::FOUND, "https://cdn.example/asset/1"),
            Canned::ok("binary"),
        ]);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "token SECRET".parse().unwrap());
        headers.insert(header::COOKIE, "session=abc".parse().unwrap());
        headers.insert(header::PROXY_AUTHORIZATION, "Basic eA==".parse().unwrap());
        headers.insert(header::RANGE, "bytes=0-5".parse().unwrap());
        let request = ProxyRequest::new(Method::GET, headers, Body::empty());
        let target = Uri::from_static("https://github.com/a/b/releases/download/v1/x.zip");

        proxy_request(&upstream, target, request, RELAY, 10)
            .await
            .unwrap();

        let requests = upstream.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].headers[header::AUTHORIZATION], "token SECRET");
        for hop in &requests[1..] {
            assert!(!hop.headers.contains_key(header::AUTHORIZATION), "{}", hop.uri);
            assert!(!hop.headers.contains_key(header::COOKIE), "{}", hop.uri);
            assert!(!hop.headers.contains_key(header::PROXY_AUTHORIZATION), "{}", hop.uri);
            assert_eq!(hop.headers[header::RANGE], "bytes=0-5");
        }
    }

    #[test]
    fn test_follow_hop_keeps_credentials_on_same_origin() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "token SECRET".parse().unwrap());
        let request = ProxyRequest::new(Method::GET, headers, Body::empty());
        let from = Uri::from_static("https://github.com/a/b/archive/main.zip");

        let next = request.follow_hop(
            StatusCode::FOUND,
            &from,
            &Uri::from_static("https://GitHub.com:443/a/b/archive/refs/heads/main.zip"),
        );
        assert_eq!(next.headers[header::AUTHORIZATION], "token SECRET");

        let next = request.follow_hop(
            StatusCode::FOUND,
            &from,
            &Uri::from_static("http://github.com/a/b/archive/main.zip"),
        );
        assert!(!next.headers.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_redirect_chain_is_capped() {
        let upstream = MockUpstream::new(vec![
            Canned::redirect(StatusCode::FOUND, "https://cdn.example/1"),
            Canned::redirect(StatusCode::FOUND, "https://cdn.example/2"),
            Canned::redirect(StatusCode::FOUND, "https://cdn.example/3"),
        ]);
        let target = Uri::from_static("https://github.com/a/b/archive/main.zip");

        let err = proxy_request(&upstream, target, get(), RELAY, 2)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::TooManyRedirects(2)));
        assert_eq!(upstream.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_redirect_is_fatal() {
        let upstream = MockUpstream::new(vec![Canned::redirect(
            StatusCode::FOUND,
            "https://bad host/x",
        )]);
        let target = Uri::from_static("https://github.com/a/b/archive/main.zip");
        let err = proxy_request(&upstream, target, get(), RELAY, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRedirect(_)));
        assert_eq!(err.to_status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_network_failure_is_an_upstream_error() {
        let upstream = MockUpstream::new(vec![Canned::Fail("connection reset")]);
        let target = Uri::from_static("https://github.com/a/b/archive/main.zip");
        let err = proxy_request(&upstream, target, get(), RELAY, 10)
            .await
            .unwrap_err();
        assert_eq!(err.to_user_message(), "Proxy Error: connection reset");
    }

    #[tokio::test]
    async fn test_post_body_sent_once_then_dropped_on_see_other() {
        let upstream = MockUpstream::new(vec![
            Canned::redirect(StatusCode::SEE_OTHER, "https://cdn.example/result"),
            Canned::ok("done"),
        ]);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        headers.insert(header::CONTENT_LENGTH, "4".parse().unwrap());
        let request = ProxyRequest::new(Method::POST, headers, Body::from("data"));
        let target = Uri::from_static("https://github.com/a/b.git/git-upload-pack");

        proxy_request(&upstream, target, request, RELAY, 10)
            .await
            .unwrap();

        let requests = upstream.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(&requests[0].body[..], b"data");
        assert_eq!(requests[1].method, Method::GET);
        assert!(requests[1].body.is_empty());
        assert!(!requests[1].headers.contains_key(header::CONTENT_LENGTH));
        assert!(!requests[1].headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_follow_hop_keeps_method_for_temporary_redirect() {
        let request = ProxyRequest::new(Method::PUT, HeaderMap::new(), Body::empty());
        let uri = Uri::from_static("https://cdn.example/upload");
        let next = request.follow_hop(StatusCode::TEMPORARY_REDIRECT, &uri, &uri);
        assert_eq!(next.method, Method::PUT);
        assert_eq!(next.redirect, RedirectMode::Follow);
    }
}
