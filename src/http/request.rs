//! Request inspection helpers.

use axum::{extract::Request, http::header};

/// Host the client asked for, port included when present.
///
/// HTTP/1 clients send a `Host` header; HTTP/2 clients carry the authority in
/// the request URI instead.
pub fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn prefers_host_header() {
        let request = axum::http::Request::get("https://authority.example/")
            .header(header::HOST, "header.example:8443")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request), Some("header.example:8443"));
    }

    #[test]
    fn falls_back_to_uri_authority() {
        let request = axum::http::Request::get("https://authority.example/x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request), Some("authority.example"));
    }

    #[test]
    fn missing_host_is_none() {
        let request = axum::http::Request::get("/x").body(Body::empty()).unwrap();
        assert_eq!(request_host(&request), None);
    }
}
