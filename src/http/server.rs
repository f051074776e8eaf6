//! HTTPS server setup.
//!
//! # Responsibilities
//! - Build the Axum router: `ServeDir` wrapped in the request pipeline
//! - Load the TLS certificate and key
//! - Apply the connection lifecycle policy beneath TLS
//! - Bind, serve, and drain on shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::{tls_rustls::RustlsAcceptor, Handle};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::services::ServeDir;

use crate::config::validation::MIN_HEADER_BYTES;
use crate::config::ServerConfig;
use crate::http::middleware::apply_pipeline;
use crate::net::{load_tls_config, ConnectionTimeouts, TimeoutAcceptor};
use crate::observability::logging::{LogSink, TracingSink};
use crate::security::rate_limit::RateLimiter;

/// How long in-flight requests may keep running once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid listen address {0:?}")]
    Address(String),

    #[error("failed to load TLS certificate or key: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static-content HTTPS server.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    timeouts: ConnectionTimeouts,
    handle: Handle,
}

impl HttpServer {
    /// Create a server whose access lines go to `tracing`.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a server writing access lines to `sink`.
    pub fn with_sink(config: ServerConfig, sink: Arc<dyn LogSink>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.events_per_second));
        let router = build_router(&config.content_dir, limiter, sink);
        let timeouts = ConnectionTimeouts::from(&config.timeouts);

        Self {
            router,
            config,
            timeouts,
            handle: Handle::new(),
        }
    }

    /// Override the connection timeouts taken from the configuration.
    pub fn with_timeouts(mut self, timeouts: ConnectionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Handle for observing the bound address or stopping the server.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Serve until `shutdown` fires, then drain for [`SHUTDOWN_GRACE`].
    ///
    /// A closed channel (every sender dropped) is not a shutdown request.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = self
            .config
            .listen_addr()
            .ok_or_else(|| ServerError::Address(self.config.port.clone()))?;

        let tls = load_tls_config(&self.config.cert_file, &self.config.key_file)
            .await
            .map_err(ServerError::Tls)?;
        let acceptor = RustlsAcceptor::new(tls).acceptor(TimeoutAcceptor::new(self.timeouts));

        let handle = self.handle.clone();
        tokio::spawn(async move {
            match shutdown.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    tracing::info!(
                        grace_secs = SHUTDOWN_GRACE.as_secs(),
                        "Shutdown requested, draining connections"
                    );
                    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
                }
                Err(RecvError::Closed) => {}
            }
        });

        let mut server = axum_server::bind(addr)
            .acceptor(acceptor)
            .handle(self.handle.clone());
        server
            .http_builder()
            .http1()
            .max_buf_size(self.config.max_header_bytes.max(MIN_HEADER_BYTES));

        tracing::info!(
            address = %addr,
            read_timeout = ?self.timeouts.read,
            write_timeout = ?self.timeouts.write,
            idle_timeout = ?self.timeouts.idle,
            "HTTPS server starting"
        );

        server
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// `ServeDir` rooted at `content_dir`, wrapped in the request pipeline.
pub fn build_router(
    content_dir: &Path,
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn LogSink>,
) -> Router {
    let files = Router::new().fallback_service(ServeDir::new(content_dir));
    apply_pipeline(files, limiter, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::MemorySink;
    use crate::security::headers::SECURITY_HEADERS;
    use axum::{
        body::Body,
        http::{header, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Site {
        // Keeps the directory alive for the test's duration.
        _root: tempfile::TempDir,
        app: Router,
        sink: MemorySink,
    }

    fn site() -> Site {
        let root = tempfile::tempdir().unwrap();
        let content = root.path().join("content");
        std::fs::create_dir_all(content.join("docs")).unwrap();
        std::fs::write(content.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(content.join("docs/index.html"), "<h1>docs</h1>").unwrap();
        std::fs::write(content.join("style.css"), "body {}").unwrap();
        std::fs::write(root.path().join("secret.txt"), "outside").unwrap();

        let sink = MemorySink::new();
        let app = build_router(
            &content,
            Arc::new(RateLimiter::new(100)),
            Arc::new(sink.clone()),
        );
        Site {
            _root: root,
            app,
            sink,
        }
    }

    fn get(uri: &str) -> axum::extract::Request {
        axum::http::Request::get(uri)
            .header(header::HOST, "example.com")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_serves_index() {
        let site = site();
        let response = site.app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        for (name, value) in SECURITY_HEADERS {
            assert_eq!(response.headers()[&name], value);
        }
        assert_eq!(body_string(response).await, "<h1>home</h1>");
    }

    #[tokio::test]
    async fn nested_directory_serves_its_index() {
        let site = site();
        let response = site.app.oneshot(get("/docs/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>docs</h1>");
    }

    #[tokio::test]
    async fn content_type_is_guessed() {
        let site = site();
        let response = site.app.oneshot(get("/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }

    #[tokio::test]
    async fn missing_file_is_not_found_with_headers() {
        let site = site();
        let response = site.app.oneshot(get("/nope.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn parent_components_do_not_escape_root() {
        let site = site();
        let response = site.app.oneshot(get("/../secret.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!body_string(response).await.contains("outside"));
    }

    #[tokio::test]
    async fn log_lines_match_the_response() {
        let site = site();
        let response = site.app.oneshot(get("/")).await.unwrap();
        let body = body_string(response).await;

        assert_eq!(
            site.sink.lines(),
            vec![
                r#"- "GET / HTTP/1.1""#.to_owned(),
                format!(r#"- "GET / HTTP/1.1" 200 {}"#, body.len()),
            ]
        );
    }
}
