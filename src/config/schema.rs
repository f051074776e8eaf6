//! Configuration schema definitions.
//!
//! The server reads a single JSON object at startup. Field names follow the
//! JSON file (`cert`, `key`, `content`, `logs`, `port`, `eventsPerSecond`);
//! the optional `timeouts` and `maxHeaderBytes` entries fall back to defaults.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Burst capacity is this many seconds' worth of events. One page load is
/// HTML, CSS and JS plus some margin.
pub const BURST_FACTOR: u32 = 4;

/// Default cap on the size of a request head (1 MiB).
pub const DEFAULT_MAX_HEADER_BYTES: usize = 1 << 20;

/// Root configuration, immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Path to the certificate chain (PEM).
    #[serde(rename = "cert")]
    pub cert_file: PathBuf,

    /// Path to the private key (PEM).
    #[serde(rename = "key")]
    pub key_file: PathBuf,

    /// Directory served to clients.
    #[serde(rename = "content")]
    pub content_dir: PathBuf,

    /// Directory receiving `server.log`.
    #[serde(rename = "logs")]
    pub logs_dir: PathBuf,

    /// Listen port, either `":8443"`, `"8443"` or a full `"host:port"`.
    pub port: String,

    /// Sustained global request budget.
    pub events_per_second: u32,

    /// Connection lifecycle timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Largest request head accepted on HTTP/1 connections.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

impl ServerConfig {
    /// Resolve `port` into the socket address to bind.
    ///
    /// A bare port (with or without a leading colon) binds every IPv4
    /// interface.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        let port = self.port.trim();
        let bare = port.strip_prefix(':').unwrap_or(port);
        if let Ok(number) = bare.parse::<u16>() {
            return Some(SocketAddr::from((Ipv4Addr::UNSPECIFIED, number)));
        }
        port.parse().ok()
    }

    /// Token bucket capacity derived from the sustained rate.
    pub fn burst(&self) -> u32 {
        self.events_per_second.saturating_mul(BURST_FACTOR)
    }
}

/// Server-side connection timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Time allowed to receive a complete request.
    pub read_secs: u64,

    /// Time allowed to send a response.
    pub write_secs: u64,

    /// Time a keep-alive connection may sit without a request.
    pub idle_secs: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            write_secs: 10,
            idle_secs: 15,
        }
    }
}

fn default_max_header_bytes() -> usize {
    DEFAULT_MAX_HEADER_BYTES
}
