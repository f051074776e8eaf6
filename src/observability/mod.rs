//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Diagnostics (every module)
//!     → tracing events → logging.rs subscriber → stdout + <logs>/server.log
//!
//! Access log (per request)
//!     → access_log.rs (start line, end line on body completion)
//!     → LogSink → tracing target "access"
//! ```

pub mod access_log;
pub mod logging;
