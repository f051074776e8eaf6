//! Startup orchestration.
//!
//! Load and validate the configuration, install logging, then serve until a
//! signal arrives. Any failure before the listener is bound is fatal.

use std::path::Path;

use crate::config::{load_config, ConfigError, ServerConfig};
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::logging::{init_logging, LoggingError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Run the server described by the configuration file at `config_path`.
pub async fn run(config_path: &Path) -> Result<(), StartupError> {
    let config = load_config(config_path)?;
    let log_file = init_logging(&config.logs_dir)?;

    log_banner(&config, config_path, &log_file);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let receiver = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    server.run(receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_banner(config: &ServerConfig, config_path: &Path, log_file: &Path) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "static-guard starting"
    );
    tracing::info!(
        port = %config.port,
        content = %config.content_dir.display(),
        log_file = %log_file.display(),
        events_per_second = config.events_per_second,
        burst = config.burst(),
        read_secs = config.timeouts.read_secs,
        write_secs = config.timeouts.write_secs,
        idle_secs = config.timeouts.idle_secs,
        max_header_bytes = config.max_header_bytes,
        "Configuration loaded"
    );
}
