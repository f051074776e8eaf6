//! Request pipeline.
//!
//! Every request walks the same stages, in this order:
//!
//! ```text
//! rate limit → access log → host redirect → method gate → security headers → ServeDir
//! ```
//!
//! Cheap rejections (429, 302, 405) short-circuit before any file I/O. The
//! security headers sit last so they land on the response head the file
//! responder produces, and nowhere else.
//!
//! The order lives in [`PIPELINE`]; [`apply_pipeline`] layers the stages from
//! that list so the wiring cannot drift from it.

pub mod host_redirect;
pub mod method_gate;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::observability::access_log::access_log_middleware;
use crate::observability::logging::LogSink;
use crate::security::headers::security_headers;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

pub use host_redirect::host_redirect;
pub use method_gate::method_gate;

/// One stage of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    AccessLog,
    HostRedirect,
    MethodGate,
    SecurityHeaders,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::RateLimit => "rate_limit",
            Stage::AccessLog => "access_log",
            Stage::HostRedirect => "host_redirect",
            Stage::MethodGate => "method_gate",
            Stage::SecurityHeaders => "security_headers",
        }
    }
}

/// Stages in the order a request meets them.
pub const PIPELINE: [Stage; 5] = [
    Stage::RateLimit,
    Stage::AccessLog,
    Stage::HostRedirect,
    Stage::MethodGate,
    Stage::SecurityHeaders,
];

/// Wrap `router` (routes and fallback) in every pipeline stage.
pub fn apply_pipeline(router: Router, limiter: Arc<RateLimiter>, sink: Arc<dyn LogSink>) -> Router {
    // The last layer applied is the outermost, so walk the list backwards.
    PIPELINE
        .iter()
        .rev()
        .fold(router, |router, stage| match stage {
            Stage::RateLimit => router.layer(from_fn_with_state(
                Arc::clone(&limiter),
                rate_limit_middleware,
            )),
            Stage::AccessLog => {
                router.layer(from_fn_with_state(Arc::clone(&sink), access_log_middleware))
            }
            Stage::HostRedirect => router.layer(from_fn(host_redirect)),
            Stage::MethodGate => router.layer(from_fn(method_gate)),
            Stage::SecurityHeaders => router.layer(from_fn(security_headers)),
        })
}
