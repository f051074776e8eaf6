//! Access logging.
//!
//! Every admitted request produces two lines in the [`LogSink`]:
//!
//! ```text
//! 10.0.0.7:51234 "GET /index.html HTTP/1.1"
//! 10.0.0.7:51234 "GET /index.html HTTP/1.1" 200 5120
//! ```
//!
//! The first is written on receipt. The second is written by the
//! [`ResponseObserver`] once the response body has been fully streamed, or
//! dropped by the transport (HEAD responses, aborted connections), so the
//! byte count is what actually left the handler.

use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body::{Frame, SizeHint};

use crate::observability::logging::LogSink;

/// The request half of an access log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
}

impl AccessLogEntry {
    pub fn from_request(request: &Request) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".to_owned());

        Self {
            remote_addr,
            method: request.method().to_string(),
            path: request.uri().path().to_owned(),
            protocol: format!("{:?}", request.version()),
        }
    }
}

impl fmt::Display for AccessLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{} {} {}\"",
            self.remote_addr, self.method, self.path, self.protocol
        )
    }
}

/// Records the status and byte count of one response and writes the closing
/// access line exactly once.
pub struct ResponseObserver {
    entry: AccessLogEntry,
    sink: Arc<dyn LogSink>,
    status: Option<StatusCode>,
    bytes: u64,
    finished: bool,
}

impl ResponseObserver {
    pub fn new(entry: AccessLogEntry, sink: Arc<dyn LogSink>) -> Self {
        Self {
            entry,
            sink,
            status: None,
            bytes: 0,
            finished: false,
        }
    }

    /// The first recorded status wins.
    pub fn observe_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    pub fn observe_bytes(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    /// 200 until a status is observed.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.sink.append(&format!(
            "{} {} {}",
            self.entry,
            self.status().as_u16(),
            self.bytes
        ));
    }
}

impl Drop for ResponseObserver {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Response body that reports every data frame to a [`ResponseObserver`].
pub struct ObservedBody {
    inner: Body,
    observer: ResponseObserver,
}

impl ObservedBody {
    pub fn new(inner: Body, observer: ResponseObserver) -> Self {
        Self { inner, observer }
    }
}

impl http_body::Body for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.observer.observe_bytes(data.len());
                }
            }
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.observer.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Middleware writing the opening line and attaching an observer to the
/// response body.
pub async fn access_log_middleware(
    State(sink): State<Arc<dyn LogSink>>,
    request: Request,
    next: Next,
) -> Response {
    let entry = AccessLogEntry::from_request(&request);
    sink.append(&entry.to_string());

    // Built only once a response exists: a cancelled handler leaves no end line.
    let response = next.run(request).await;
    let mut observer = ResponseObserver::new(entry, sink);
    observer.observe_status(response.status());

    response.map(|body| Body::new(ObservedBody::new(body, observer)))
}
