//! GET-only gate.

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::response::plain_error;

/// Pass GET requests on; answer everything else with 405 and `Allow: GET`.
pub async fn method_gate(request: Request, next: Next) -> Response {
    if request.method() == Method::GET {
        return next.run(request).await;
    }

    tracing::debug!(method = %request.method(), path = %request.uri().path(), "Method not allowed");
    let mut response = plain_error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("GET"));
    response
}
