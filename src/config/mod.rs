//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --config <FILE> (JSON)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable for the process lifetime)
//! ```
//!
//! Any failure here is fatal: the process exits before binding a socket.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ServerConfig, TimeoutConfig};
pub use validation::ValidationError;
