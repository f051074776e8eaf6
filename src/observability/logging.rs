//! Structured logging.
//!
//! Diagnostics go through `tracing`. The subscriber installed by
//! [`init_logging`] writes every event to stdout and appends it to
//! `<logs>/server.log`; rotation of that file belongs to external log
//! management.
//!
//! Access lines do not talk to the subscriber directly. They are handed to a
//! [`LogSink`], injected when the router is built, so tests can capture them
//! with a [`MemorySink`].

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// File name of the append-only log inside the log directory.
pub const LOG_FILE_NAME: &str = "server.log";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "static_guard=info,access=info";

/// Anything that can append one line of text.
pub trait LogSink: Send + Sync + 'static {
    fn append(&self, line: &str);
}

/// Forwards lines to `tracing` under the `access` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, line: &str) {
        tracing::info!(target: "access", "{line}");
    }
}

/// Keeps lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line appended so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber: stdout plus `<logs_dir>/server.log`.
///
/// The log directory is created when missing.
pub fn init_logging(logs_dir: &Path) -> Result<PathBuf, LoggingError> {
    let path = logs_dir.join(LOG_FILE_NAME);
    let io_error = |source| LoggingError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(logs_dir).map_err(io_error)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_error)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init()?;

    Ok(path)
}
