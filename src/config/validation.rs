//! Configuration validation.
//!
//! Serde handles the syntax (missing fields, wrong types). This module checks
//! what serde cannot: empty paths, a zero budget, an unparsable port, a
//! content directory that does not exist. Every problem is reported, not just
//! the first one.

use std::path::{Path, PathBuf};

use crate::config::schema::ServerConfig;

/// Smallest read buffer hyper accepts for HTTP/1 connections.
pub const MIN_HEADER_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("`eventsPerSecond` must be greater than zero")]
    ZeroRate,

    #[error("`port` {0:?} is not a port or socket address")]
    InvalidPort(String),

    #[error("content directory {0:?} is not a directory")]
    MissingContentDir(PathBuf),

    #[error("timeout `{0}` must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("`maxHeaderBytes` must be at least {min}, got {0}", min = MIN_HEADER_BYTES)]
    HeaderLimitTooSmall(usize),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let paths: [(&'static str, &Path); 4] = [
        ("cert", &config.cert_file),
        ("key", &config.key_file),
        ("content", &config.content_dir),
        ("logs", &config.logs_dir),
    ];
    for (field, path) in paths {
        if path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyField(field));
        }
    }

    if config.port.trim().is_empty() {
        errors.push(ValidationError::EmptyField("port"));
    } else if config.listen_addr().is_none() {
        errors.push(ValidationError::InvalidPort(config.port.clone()));
    }

    if config.events_per_second == 0 {
        errors.push(ValidationError::ZeroRate);
    }

    if !config.content_dir.as_os_str().is_empty() && !config.content_dir.is_dir() {
        errors.push(ValidationError::MissingContentDir(config.content_dir.clone()));
    }

    let timeouts = [
        ("readSecs", config.timeouts.read_secs),
        ("writeSecs", config.timeouts.write_secs),
        ("idleSecs", config.timeouts.idle_secs),
    ];
    for (name, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::HeaderLimitTooSmall(config.max_header_bytes));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
