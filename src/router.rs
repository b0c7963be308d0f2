//! Application router configuration.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::infra;
use crate::proxy;
use crate::state::AppState;

/// Create the application router with all routes configured.
///
/// Everything outside the two operational endpoints goes through the
/// relay dispatcher, whatever the method.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health::health_liveness))
        .route("/metrics", get(infra::metrics::metrics_handler))
        .fallback(proxy::proxy_handler)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::services::client::testing::{Canned, MockUpstream};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_health_and_relays_the_rest() {
        let upstream = Arc::new(MockUpstream::new(vec![Canned::ok("tarball")]));
        let app = create_router(AppState::new(Settings::default(), upstream.clone()));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/github.com/a/b/archive/v1.tar.gz")
                    .header("host", "relay.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.requests().len(), 1);
    }
}
