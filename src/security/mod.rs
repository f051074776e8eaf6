//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (global token bucket, 429 when empty)
//!     → ... rest of the pipeline ...
//!     → headers.rs (CSP, HSTS, nosniff, frame options on file responses)
//! ```
//!
//! # Design Decisions
//! - One process-wide admission budget, not per client
//! - Rejections are cheap: no file I/O before the bucket admits a request

pub mod headers;
pub mod rate_limit;
