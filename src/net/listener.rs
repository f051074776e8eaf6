//! Accept-time wiring of the connection lifecycle policy.
//!
//! [`TimeoutAcceptor`] plugs into `axum-server` underneath the TLS acceptor:
//! the raw TCP stream is wrapped in a [`TimedIo`] (so the TLS handshake is
//! bounded too) and the per-connection service in a [`ClockedService`] that
//! tells the shared [`ConnectionClock`] when a request is in flight.

use std::future::{ready, Ready};
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_server::accept::Accept;
use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tower::Service;

use crate::net::connection::{ConnectionClock, ConnectionTimeouts, TimedIo};

/// Acceptor applying [`ConnectionTimeouts`] to every accepted stream.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutAcceptor {
    timeouts: ConnectionTimeouts,
}

impl TimeoutAcceptor {
    /// Acceptor closing connections that outlive `timeouts`.
    pub fn new(timeouts: ConnectionTimeouts) -> Self {
        Self { timeouts }
    }
}

impl<I, S> Accept<I, S> for TimeoutAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TimedIo<I>;
    type Service = ClockedService<S>;
    type Future = Ready<io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let clock = ConnectionClock::new();
        tracing::trace!(connection_id = %clock.id(), "Connection accepted");

        let stream = TimedIo::new(stream, Arc::clone(&clock), self.timeouts);
        ready(Ok((stream, ClockedService::new(service, clock))))
    }
}

/// Service wrapper marking each call as an in-flight request on the
/// connection's clock.
#[derive(Debug, Clone)]
pub struct ClockedService<S> {
    inner: S,
    clock: Arc<ConnectionClock>,
}

impl<S> ClockedService<S> {
    pub fn new(inner: S, clock: Arc<ConnectionClock>) -> Self {
        Self { inner, clock }
    }
}

impl<S, R> Service<R> for ClockedService<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        let guard = self.clock.begin_request();
        let response = self.inner.call(request);
        Box::pin(async move {
            let result = response.await;
            drop(guard);
            result
        })
    }
}
