//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use static_guard::config::{ServerConfig, TimeoutConfig};
use static_guard::http::{HttpServer, ServerError};
use static_guard::lifecycle::Shutdown;
use static_guard::net::ConnectionTimeouts;
use static_guard::observability::logging::MemorySink;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const INDEX_HTML: &str = "<html><body>hello</body></html>\n";

/// Temporary site: content directory with an `index.html`, plus a fresh
/// self-signed certificate for `localhost` / `127.0.0.1`.
pub struct Site {
    pub dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        std::fs::create_dir_all(content.join("wiki")).unwrap();
        std::fs::write(content.join("index.html"), INDEX_HTML).unwrap();
        std::fs::write(content.join("wiki/index.html"), "wiki home\n").unwrap();

        let generated = rcgen::generate_simple_self_signed(vec![
            "localhost".to_owned(),
            "127.0.0.1".to_owned(),
        ])
        .unwrap();
        std::fs::write(dir.path().join("cert.pem"), generated.cert.pem()).unwrap();
        std::fs::write(
            dir.path().join("key.pem"),
            generated.signing_key.serialize_pem(),
        )
        .unwrap();

        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn content_dir(&self) -> PathBuf {
        self.path().join("content")
    }

    pub fn config(&self, events_per_second: u32) -> ServerConfig {
        ServerConfig {
            cert_file: self.path().join("cert.pem"),
            key_file: self.path().join("key.pem"),
            content_dir: self.content_dir(),
            logs_dir: self.path().join("logs"),
            port: "127.0.0.1:0".to_owned(),
            events_per_second,
            timeouts: TimeoutConfig::default(),
            max_header_bytes: 1 << 20,
        }
    }
}

/// A running HTTPS server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: MemorySink,
    pub site: Site,
    pub handle: Handle,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn start(events_per_second: u32) -> Self {
        Self::start_with(events_per_second, None).await
    }

    pub async fn start_with(events_per_second: u32, timeouts: Option<ConnectionTimeouts>) -> Self {
        let site = Site::new();
        let sink = MemorySink::new();
        let mut server = HttpServer::with_sink(site.config(events_per_second), Arc::new(sink.clone()));
        if let Some(timeouts) = timeouts {
            server = server.with_timeouts(timeouts);
        }

        let handle = server.handle();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(server.run(shutdown.subscribe()));

        let addr = tokio::time::timeout(Duration::from_secs(5), handle.listening())
            .await
            .expect("server did not start in time")
            .expect("server failed to bind");

        Self {
            addr,
            sink,
            site,
            handle,
            shutdown,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://127.0.0.1:{}{}", self.addr.port(), path)
    }

    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(15), self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

/// HTTPS client trusting any certificate and never following redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Poll `sink` until it holds at least `count` lines.
///
/// End lines are written when the body finishes streaming, which can be a
/// moment after the client has read the response.
pub async fn wait_for_lines(sink: &MemorySink, count: usize) -> Vec<String> {
    for _ in 0..200 {
        let lines = sink.lines();
        if lines.len() >= count {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} log lines, got {:?}", sink.lines());
}
