//! Decide what happens to an upstream `location` header.

use axum::http::{HeaderValue, Uri};

use crate::errors::{ProxyError, ProxyResult};
use crate::providers::github;

/// Outcome for one upstream redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Still GitHub-shaped: point the client back at this relay.
    Loopback(HeaderValue),
    /// Somewhere else: follow it server-side.
    FollowForeignRedirect(Uri),
}

/// Classify `location` (resolved against `current`) and build the decision.
///
/// `relay_base` is this service's origin followed by its route prefix, for
/// example `https://relay.example/`.
pub fn decide(location: &str, current: &Uri, relay_base: &str) -> ProxyResult<RedirectDecision> {
    let absolute = resolve_location(location, current)?;
    if github::is_github_shaped(&absolute) {
        let rewritten = loopback_location(&absolute, relay_base);
        let value = HeaderValue::from_str(&rewritten)
            .map_err(|_| ProxyError::InvalidRedirect(rewritten.clone()))?;
        return Ok(RedirectDecision::Loopback(value));
    }
    let uri = absolute
        .parse::<Uri>()
        .map_err(|_| ProxyError::InvalidRedirect(absolute.clone()))?;
    Ok(RedirectDecision::FollowForeignRedirect(uri))
}

/// `<relay_base><location without scheme>`
pub fn loopback_location(location: &str, relay_base: &str) -> String {
    let stripped = location
        .strip_prefix("https://")
        .or_else(|| location.strip_prefix("http://"))
        .unwrap_or(location);
    let mut rewritten = String::with_capacity(relay_base.len() + stripped.len());
    rewritten.push_str(relay_base);
    rewritten.push_str(stripped);
    rewritten
}

/// Turn a possibly relative `location` into an absolute URL string.
pub fn resolve_location(location: &str, current: &Uri) -> ProxyResult<String> {
    let location = location.trim();
    let invalid = || ProxyError::InvalidRedirect(location.to_string());
    if location.is_empty() {
        return Err(invalid());
    }

    let scheme = current.scheme_str().unwrap_or("https");
    let has_scheme = location
        .find("://")
        .is_some_and(|idx| !location[..idx].contains('/'));

    let absolute = if has_scheme {
        location.to_string()
    } else if let Some(rest) = location.strip_prefix("//") {
        format!("{}://{}", scheme, rest)
    } else {
        let authority = current.authority().ok_or_else(invalid)?;
        if location.starts_with('/') {
            format!("{}://{}{}", scheme, authority, location)
        } else {
            let base_path = current.path();
            let dir = base_path
                .rfind('/')
                .map(|idx| &base_path[..=idx])
                .unwrap_or("/");
            format!("{}://{}{}{}", scheme, authority, dir, location)
        }
    };

    let parsed = absolute.parse::<Uri>().map_err(|_| invalid())?;
    let web_scheme = matches!(parsed.scheme_str(), Some(s) if s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https"));
    if !web_scheme || parsed.host().is_none_or(str::is_empty) {
        return Err(invalid());
    }
    Ok(absolute)
}
