//! Security response headers.
//!
//! Set on the response head returned by the file responder, before hyper
//! writes a single body byte.

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Headers added to every response that reaches the file responder.
pub const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    // Only load resources from the page's own origin.
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    // No framing by other origins.
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
];

/// Run the rest of the chain, then overwrite the security headers on its
/// response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}
