//! Connection lifecycle timeouts.
//!
//! # Responsibilities
//! - Track, per connection, whether a request is in flight
//! - Derive the read and write deadlines from that state
//! - Fail the socket with `TimedOut` when a deadline passes, which makes
//!   hyper drop the connection without sending a response
//!
//! | phase                              | read deadline               |
//! |------------------------------------|-----------------------------|
//! | before the first request           | accept + `read`             |
//! | request bytes arriving             | first byte + `read`         |
//! | request dispatched, in flight      | none                        |
//! | keep-alive, waiting                | last activity + `idle`      |
//!
//! Writes must finish within `write` of the dispatch of the request they
//! answer (or of the accept, for handshake traffic).

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};

use crate::config::schema::TimeoutConfig;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Read, write and idle limits applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    pub read: Duration,
    pub write: Duration,
    pub idle: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ConnectionTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            read: config.read(),
            write: config.write(),
            idle: config.idle(),
        }
    }
}

#[derive(Debug)]
struct ClockState {
    accepted_at: Instant,
    last_activity: Instant,
    /// First byte of a request that has not been dispatched yet.
    request_started: Option<Instant>,
    /// Dispatch time of the most recent request.
    response_started: Option<Instant>,
    in_flight: usize,
    served: u64,
}

/// Per-connection timing state shared by the socket wrapper and the service.
#[derive(Debug)]
pub struct ConnectionClock {
    id: ConnectionId,
    state: Mutex<ClockState>,
}

impl ConnectionClock {
    pub fn new() -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            id: ConnectionId::new(),
            state: Mutex::new(ClockState {
                accepted_at: now,
                last_activity: now,
                request_started: None,
                response_started: None,
                in_flight: 0,
                served: 0,
            }),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Mark a request as dispatched. The returned guard ends it on drop.
    pub fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        let now = Instant::now();
        let mut state = self.lock();
        state.in_flight += 1;
        state.served += 1;
        state.request_started = None;
        state.response_started = Some(now);
        state.last_activity = now;
        InFlightGuard {
            clock: Arc::clone(self),
        }
    }

    /// Requests dispatched on this connection so far.
    pub fn served(&self) -> u64 {
        self.lock().served
    }

    fn record_read(&self, len: usize) {
        if len == 0 {
            return;
        }
        let now = Instant::now();
        let mut state = self.lock();
        state.last_activity = now;
        if state.in_flight == 0 && state.request_started.is_none() {
            state.request_started = Some(now);
        }
    }

    fn record_write(&self, len: usize) {
        if len > 0 {
            self.lock().last_activity = Instant::now();
        }
    }

    /// Deadline for a pending read, and the limit it enforces.
    fn read_deadline(&self, timeouts: &ConnectionTimeouts) -> Option<(Instant, &'static str)> {
        let state = self.lock();
        if state.in_flight > 0 {
            None
        } else if state.served == 0 {
            Some((state.accepted_at + timeouts.read, "read"))
        } else if let Some(started) = state.request_started {
            Some((started + timeouts.read, "read"))
        } else {
            Some((state.last_activity + timeouts.idle, "idle"))
        }
    }

    fn write_deadline(&self, timeouts: &ConnectionTimeouts) -> Instant {
        let state = self.lock();
        state.response_started.unwrap_or(state.accepted_at) + timeouts.write
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ends an in-flight request when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    clock: Arc<ConnectionClock>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.clock.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.last_activity = Instant::now();
    }
}

/// Socket wrapper enforcing the deadlines of its [`ConnectionClock`].
pub struct TimedIo<S> {
    inner: S,
    clock: Arc<ConnectionClock>,
    timeouts: ConnectionTimeouts,
    read_timer: Pin<Box<Sleep>>,
    write_timer: Pin<Box<Sleep>>,
}

impl<S> TimedIo<S> {
    /// Must be called from within a tokio runtime.
    pub fn new(inner: S, clock: Arc<ConnectionClock>, timeouts: ConnectionTimeouts) -> Self {
        let now = Instant::now();
        Self {
            inner,
            clock,
            timeouts,
            read_timer: Box::pin(tokio::time::sleep_until(now + timeouts.read)),
            write_timer: Box::pin(tokio::time::sleep_until(now + timeouts.write)),
        }
    }
}

/// Park on `timer` until `deadline`, then report a timeout.
fn poll_deadline(
    timer: &mut Pin<Box<Sleep>>,
    deadline: Instant,
    cx: &mut Context<'_>,
    id: ConnectionId,
    phase: &'static str,
) -> Poll<io::Error> {
    if timer.deadline() != deadline {
        timer.as_mut().reset(deadline);
    }
    match timer.as_mut().poll(cx) {
        Poll::Ready(()) => {
            tracing::debug!(connection_id = %id, phase, "Connection timed out");
            Poll::Ready(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{phase} timeout"),
            ))
        }
        Poll::Pending => Poll::Pending,
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimedIo<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.clock.record_read(buf.filled().len() - before);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => match this.clock.read_deadline(&this.timeouts) {
                Some((deadline, phase)) => {
                    poll_deadline(&mut this.read_timer, deadline, cx, this.clock.id(), phase)
                        .map(Err)
                }
                None => Poll::Pending,
            },
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimedIo<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.clock.record_write(n);
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_write_deadline(cx).map(Err),
        }
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_write_vectored(cx, bufs) {
            Poll::Ready(Ok(n)) => {
                this.clock.record_write(n);
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_write_deadline(cx).map(Err),
        }
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_flush(cx) {
            Poll::Pending => this.poll_write_deadline(cx).map(Err),
            ready => ready,
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<S> TimedIo<S> {
    fn poll_write_deadline(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        let deadline = self.clock.write_deadline(&self.timeouts);
        poll_deadline(&mut self.write_timer, deadline, cx, self.clock.id(), "write")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn timeouts(read: u64, write: u64, idle: u64) -> ConnectionTimeouts {
        ConnectionTimeouts {
            read: Duration::from_millis(read),
            write: Duration::from_millis(write),
            idle: Duration::from_millis(idle),
        }
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn defaults_follow_config() {
        let t = ConnectionTimeouts::default();
        assert_eq!(t.read, Duration::from_secs(5));
        assert_eq!(t.write, Duration::from_secs(10));
        assert_eq!(t.idle, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn read_deadline_follows_phases() {
        let t = timeouts(100, 200, 300);
        let clock = ConnectionClock::new();
        let accepted = clock.lock().accepted_at;

        assert_eq!(clock.read_deadline(&t), Some((accepted + t.read, "read")));

        let guard = clock.begin_request();
        assert_eq!(clock.read_deadline(&t), None);
        assert_eq!(clock.served(), 1);
        let dispatched = clock.lock().response_started.unwrap();
        assert_eq!(clock.write_deadline(&t), dispatched + t.write);

        drop(guard);
        let idle_from = clock.lock().last_activity;
        assert_eq!(clock.read_deadline(&t), Some((idle_from + t.idle, "idle")));

        clock.record_read(10);
        let started = clock.lock().request_started.unwrap();
        assert_eq!(clock.read_deadline(&t), Some((started + t.read, "read")));

        clock.record_read(10);
        assert_eq!(clock.lock().request_started, Some(started));
    }

    #[tokio::test]
    async fn silent_peer_is_cut_off() {
        let (client, server) = tokio::io::duplex(64);
        let mut io = TimedIo::new(server, ConnectionClock::new(), timeouts(50, 50, 50));

        let mut buf = [0u8; 8];
        let err = io.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        drop(client);
    }

    #[tokio::test]
    async fn in_flight_request_suspends_read_deadline() {
        let (mut client, server) = tokio::io::duplex(64);
        let clock = ConnectionClock::new();
        let mut io = TimedIo::new(server, Arc::clone(&clock), timeouts(30, 1_000, 30));

        let guard = clock.begin_request();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            client.write_all(b"late").await.unwrap();
            client
        });

        let mut buf = [0u8; 4];
        io.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"late");
        drop(guard);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn stalled_write_is_cut_off() {
        let (_client, server) = tokio::io::duplex(4);
        let mut io = TimedIo::new(server, ConnectionClock::new(), timeouts(1_000, 50, 1_000));

        let err = io.write_all(&[0u8; 64]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
