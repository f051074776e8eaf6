//! static-guard: serves a directory tree over HTTPS.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──TLS──▶ net (TimedIo: read/write/idle deadlines)
//!                    │
//!                    ▼
//!                  http pipeline
//!                    rate limit → access log → host redirect
//!                    → method gate → security headers
//!                    │
//!                    ▼
//!                  ServeDir (content directory)
//! ```
//!
//! Usage: `static-guard --config server.json`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "static-guard", version, about = "Hardened static-content HTTPS server")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match static_guard::lifecycle::run(&cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Startup failed");
            eprintln!("static-guard: {err}");
            ExitCode::FAILURE
        }
    }
}
