//! Target extraction from the inbound URL.

use axum::extract::Query;
use axum::http::Uri;
use serde::Deserialize;
use std::borrow::Cow;
use tracing::debug;

use crate::errors::{ProxyError, ProxyResult};
use crate::utils::url::{encode_problematic_path_chars, split_after_authority};

#[derive(Debug, Deserialize)]
struct PasteParams {
    q: Option<String>,
}

/// The `q` query parameter, if present and non-empty.
pub fn query_target(uri: &Uri) -> Option<String> {
    Query::<PasteParams>::try_from_uri(uri)
        .ok()
        .and_then(|Query(params)| params.q)
        .filter(|q| !q.is_empty())
}

/// Derive the upstream target from the request path.
///
/// The route prefix is removed, a collapsed `https:/` is repaired, a missing
/// scheme becomes `https://` and the inbound query string is carried over.
pub fn extract_target(uri: &Uri, prefix: &str) -> String {
    let path = uri.path();
    let trimmed = path
        .strip_prefix(prefix)
        .unwrap_or(path)
        .trim_start_matches('/');

    let normalized: Cow<'_, str> =
        if trimmed.starts_with("https:/") && !trimmed.starts_with("https://") {
            Cow::Owned(format!("https://{}", &trimmed[7..]))
        } else if trimmed.starts_with("http:/") && !trimmed.starts_with("http://") {
            Cow::Owned(format!("http://{}", &trimmed[6..]))
        } else {
            Cow::Borrowed(trimmed)
        };

    let mut target = coerce_scheme(&normalized);
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

/// Prepend `https://` unless the target already carries an http(s) scheme.
pub fn coerce_scheme(target: &str) -> String {
    if target.starts_with("https://") || target.starts_with("http://") {
        target.to_string()
    } else {
        format!("https://{}", target)
    }
}

/// Parse a fully-qualified target, retrying once with awkward path bytes encoded.
pub fn parse_target(target: &str) -> ProxyResult<Uri> {
    let parsed = match target.parse::<Uri>() {
        Ok(uri) => uri,
        Err(first) => {
            debug!("Target did not parse as-is ({}): {}", first, target);
            let (pre, rest) = split_after_authority(target)
                .ok_or_else(|| ProxyError::InvalidTarget(target.to_string()))?;
            let (path_part, query_part) = match rest.split_once('?') {
                Some((p, q)) => (p, Some(q)),
                None => (rest, None),
            };
            let mut rebuilt = String::with_capacity(target.len() + 16);
            rebuilt.push_str(pre);
            rebuilt.push_str(&encode_problematic_path_chars(path_part));
            if let Some(q) = query_part {
                rebuilt.push('?');
                rebuilt.push_str(&encode_problematic_path_chars(q));
            }
            rebuilt
                .parse::<Uri>()
                .map_err(|_| ProxyError::InvalidTarget(target.to_string()))?
        }
    };
    if parsed.host().is_none_or(str::is_empty) {
        return Err(ProxyError::InvalidTarget(target.to_string()));
    }
    Ok(parsed)
}
