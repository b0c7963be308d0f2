//! Main proxy request handler.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use hyper::header;
use tracing::{debug, info, warn};

use crate::config::FallbackAction;
use crate::errors::{ProxyError, ProxyResult, error_response};
use crate::handlers::files;
use crate::infra;
use crate::providers::github::{self, DispatchDecision};
use crate::proxy::engine::{ProxyRequest, proxy_request};
use crate::proxy::headers::{is_preflight, preflight_response, transform_request_headers};
use crate::proxy::resolver::{extract_target, parse_target, query_target};
use crate::services::request::{extract_client_ip, relay_origin};
use crate::state::AppState;
use crate::utils::errors::redirect_response;

/// Fallback handler: every path not claimed by an explicit route lands here.
pub async fn proxy_handler(State(state): State<AppState>, req: Request<Body>) -> Response<Body> {
    let client_ip = extract_client_ip(&req).unwrap_or_else(|| "unknown".to_string());
    let path = req.uri().path().to_string();

    match dispatch(&state, req).await {
        Ok(response) => response,
        Err(error) => {
            warn!("Proxy error [IP: {}] {}: {}", client_ip, path, error);
            error_response(error)
        }
    }
}

/// Route one inbound request.
///
/// Order matters: preflight, UA block, favicon, whitelist, `q` redirect,
/// then path-based dispatch with the configured fallback.
pub async fn dispatch(state: &AppState, req: Request<Body>) -> ProxyResult<Response<Body>> {
    if is_preflight(req.method(), req.headers()) {
        infra::metrics::record_route("preflight");
        return Ok(preflight_response());
    }

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    if state.block_list.is_blocked(user_agent) {
        debug!("Blocked user agent: {:?}", user_agent);
        infra::metrics::record_route("ua_block");
        return Ok(files::decoy_page());
    }

    if req.uri().path().eq_ignore_ascii_case("/favicon.ico") {
        infra::metrics::record_route("favicon");
        return Ok(files::favicon());
    }

    let proxy = &state.settings.proxy;
    let query = query_target(req.uri());
    let target = extract_target(req.uri(), &proxy.prefix);

    let checked = query.as_deref().unwrap_or(&target);
    if !proxy.is_whitelisted(checked) {
        info!("Rejected by whitelist: {}", checked);
        return Err(ProxyError::Blocked);
    }

    let origin = relay_origin(&req);

    if let Some(q) = query {
        infra::metrics::record_route("query_redirect");
        let location = format!("{}{}{}", origin, proxy.prefix, q);
        let location =
            HeaderValue::from_str(&location).map_err(|_| ProxyError::InvalidTarget(q.clone()))?;
        return Ok(redirect_response(StatusCode::MOVED_PERMANENTLY, location));
    }

    let mirror_base = proxy.mirror.then_some(proxy.mirror_base.as_str());
    match github::classify(&target, mirror_base) {
        DispatchDecision::Proxy { pattern, target } => {
            infra::metrics::record_route(pattern.name());
            let uri = parse_target(&target)?;
            info!(
                "Proxying request [IP: {}] ({}) -> {}",
                extract_client_ip(&req).as_deref().unwrap_or("unknown"),
                pattern.name(),
                uri
            );

            let (mut parts, body) = req.into_parts();
            transform_request_headers(&mut parts.headers);
            let request = ProxyRequest::new(parts.method, parts.headers, body);
            let relay_base = format!("{}{}", origin, proxy.prefix);

            proxy_request(
                state.upstream.as_ref(),
                uri,
                request,
                &relay_base,
                proxy.max_redirects,
            )
            .await
        }
        DispatchDecision::RewriteToMirrorAndRedirect { location } => {
            infra::metrics::record_route("mirror");
            info!("Redirecting to mirror: {}", location);
            let value = HeaderValue::from_str(&location)
                .map_err(|_| ProxyError::InvalidTarget(location.clone()))?;
            Ok(redirect_response(StatusCode::FOUND, value))
        }
        DispatchDecision::Fallback => fallback(state, req).await,
    }
}

async fn fallback(state: &AppState, req: Request<Body>) -> ProxyResult<Response<Body>> {
    match state.settings.fallback.action() {
        FallbackAction::Redirect(url) => {
            infra::metrics::record_route("fallback_redirect");
            let location = HeaderValue::from_str(url)
                .map_err(|_| ProxyError::InvalidTarget(url.to_string()))?;
            Ok(redirect_response(StatusCode::FOUND, location))
        }
        FallbackAction::Decoy => {
            infra::metrics::record_route("fallback_decoy");
            Ok(files::decoy_page())
        }
        FallbackAction::Origin(url) => {
            infra::metrics::record_route("fallback_origin");
            let uri = parse_target(url)?;
            debug!("Forwarding unmatched request to fallback origin {}", uri);

            let (mut parts, body) = req.into_parts();
            parts.headers.remove(header::HOST);
            let mut outbound = Request::builder()
                .method(parts.method)
                .uri(uri)
                .body(body)?;
            *outbound.headers_mut() = parts.headers;

            state
                .upstream
                .send(outbound)
                .await
                .map_err(|e| ProxyError::Upstream(e.to_string()))
        }
        FallbackAction::Landing => {
            infra::metrics::record_route("landing");
            Ok(files::landing_page())
        }
    }
}
