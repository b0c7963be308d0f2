/// Outbound HTTP capability used by the proxy engine
/// The hyper client is wrapped behind a trait so routing can be exercised without a network
use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::config::ServerConfig;

pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>;

/// A failed exchange with the upstream: DNS, connect, TLS or protocol errors.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UpstreamError(pub String);

pub type UpstreamFuture = BoxFuture<'static, Result<Response<Body>, UpstreamError>>;

/// Sends one request and yields the streamed response without following redirects.
pub trait Upstream: Send + Sync {
    fn send(&self, req: Request<Body>) -> UpstreamFuture;
}

/// Production upstream backed by the pooled hyper client.
#[derive(Clone)]
pub struct HyperUpstream {
    client: HyperClient,
}

impl HyperUpstream {
    pub fn new(client: HyperClient) -> Self {
        Self { client }
    }
}

impl Upstream for HyperUpstream {
    fn send(&self, req: Request<Body>) -> UpstreamFuture {
        let fut = self.client.request(req);
        Box::pin(async move {
            let response = fut.await.map_err(|e| UpstreamError(e.to_string()))?;
            Ok(response.map(Body::new))
        })
    }
}

/// Build a configured HTTP client with connection pooling and TLS
///
/// Configuration details:
/// - TCP_NODELAY: Enabled for reduced latency on small packets
/// - Connection timeout: `server.connectTimeoutSecs`
/// - Keep-alive: Enabled for connection reuse
pub fn build_client(server: &ServerConfig) -> HyperClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_nodelay(true);
    http_connector.set_connect_timeout(Some(Duration::from_secs(server.connect_timeout_secs)));
    http_connector.set_keepalive(Some(Duration::from_secs(90)));
    http_connector.enforce_http(false);

    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http_connector);

    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(8)
        .build(connector)
}

#[cfg(test)]
pub mod testing {
    //! In-memory upstream that replays canned responses and records requests.

    use super::*;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: Method,
        pub uri: Uri,
        pub headers: HeaderMap,
        pub body: bytes::Bytes,
    }

    pub enum Canned {
        Respond {
            status: StatusCode,
            headers: Vec<(&'static str, String)>,
            body: &'static str,
        },
        Fail(&'static str),
    }

    impl Canned {
        pub fn ok(body: &'static str) -> Self {
            Canned::Respond {
                status: StatusCode::OK,
                headers: Vec::new(),
                body,
            }
        }

        pub fn redirect(status: StatusCode, location: &str) -> Self {
            Canned::Respond {
                status,
                headers: vec![("location", location.to_string())],
                body: "",
            }
        }
    }

    #[derive(Default)]
    pub struct MockUpstream {
        responses: Mutex<VecDeque<Canned>>,
        requests: std::sync::Arc<Mutex<Vec<Recorded>>>,
    }

    impl MockUpstream {
        pub fn new(responses: Vec<Canned>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Default::default(),
            }
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Upstream for MockUpstream {
        fn send(&self, req: Request<Body>) -> UpstreamFuture {
            let canned = self.responses.lock().unwrap().pop_front();
            let requests = std::sync::Arc::clone(&self.requests);
            Box::pin(async move {
                let (parts, body) = req.into_parts();
                let body = http_body_util::BodyExt::collect(body)
                    .await
                    .map(|collected| collected.to_bytes())
                    .unwrap_or_default();
                requests.lock().unwrap().push(Recorded {
                    method: parts.method,
                    uri: parts.uri,
                    headers: parts.headers,
                    body,
                });
                match canned {
                    Some(Canned::Respond {
                        status,
                        headers,
                        body,
                    }) => {
                        let mut builder = Response::builder().status(status);
                        for (name, value) in headers {
                            builder = builder.header(name, value);
                        }
                        Ok(builder.body(Body::from(body)).unwrap())
                    }
                    Some(Canned::Fail(message)) => Err(UpstreamError(message.to_string())),
                    None => Err(UpstreamError("no canned response left".to_string())),
                }
            })
        }
    }
}
