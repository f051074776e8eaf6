//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (wrap stream and service with the connection clock)
//!     → tls.rs config (TLS handshake, bounded by the read timeout)
//!     → connection.rs (read / write / idle deadlines)
//!     → Hand off to HTTP layer
//! ```
//!
//! Deadlines are enforced on the raw TCP stream, so a client that stalls
//! mid-handshake is dropped the same way as one that stalls mid-request.

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionClock, ConnectionId, ConnectionTimeouts, TimedIo};
pub use listener::{ClockedService, TimeoutAcceptor};
pub use tls::load_tls_config;
