//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (Axum router, hyper connection builder)
//!     → middleware/ (rate limit → access log → host redirect → method gate → headers)
//!     → ServeDir (content directory)
//!     → response.rs helpers for short-circuit responses
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use server::{build_router, HttpServer, ServerError};
