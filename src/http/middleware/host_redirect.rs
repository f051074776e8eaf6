//! Wiki subdomain redirect.
//!
//! `wiki.<host>` has no content of its own; it is sent to the wiki landing
//! page on the bare host with a `302 Found`.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

use crate::http::request::request_host;
use crate::http::response::found;

/// Subdomain marker that triggers the redirect.
pub const WIKI_HOST_PREFIX: &str = "wiki.";

/// Landing page on the bare host.
pub const WIKI_LANDING_PATH: &str = "/wiki/index.html";

/// Redirect target for `host`, or `None` when `host` is not a wiki host.
pub fn wiki_redirect_target(host: &str) -> Option<String> {
    host.strip_prefix(WIKI_HOST_PREFIX)
        .map(|rest| format!("https://{rest}{WIKI_LANDING_PATH}"))
}

/// Answer requests for a wiki host with a redirect to the landing page;
/// everything else continues down the pipeline.
pub async fn host_redirect(request: Request, next: Next) -> Response {
    let location = request_host(&request)
        .and_then(wiki_redirect_target)
        .and_then(|target| HeaderValue::try_from(target).ok());

    match location {
        Some(location) => {
            tracing::debug!(location = ?location, "Redirecting wiki host");
            found(location)
        }
        None => next.run(request).await,
    }
}
