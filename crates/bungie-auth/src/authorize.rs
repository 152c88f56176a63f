//! Challenge redirect construction
//!
//! The caller's absolute URL rides through the provider as the `state`
//! parameter and comes back on the callback as the resume target. It is an
//! opaque round-trip value, not a signed or correlated CSRF token.

use url::Url;

use crate::constants::STATE_PARAM;

/// Absolute URL of an inbound request, scheme forced to `https`.
///
/// `host` comes from the request's `Host` header; an empty host yields
/// `https://<path>` with no authority, mirroring what the platform echoes.
pub fn resume_url(host: &str, path_and_query: &str) -> String {
    let path = if path_and_query.is_empty() {
        "/"
    } else {
        path_and_query
    };
    format!("https://{host}{path}")
}

/// Authorization URL with `state` set to `resume`.
///
/// Any `state` already present on the configured URL is replaced; every
/// other query parameter is kept in order.
pub fn challenge_url(authorize_url: &Url, resume: &str) -> Url {
    let mut target = authorize_url.clone();
    let retained: Vec<(String, String)> = target
        .query_pairs()
        .filter(|(key, _)| key != STATE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    target
        .query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(STATE_PARAM, resume);
    target
}
