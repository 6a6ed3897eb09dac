/// Structured logging setup using tracing
///
/// Writes to stderr (never stdout): stdout carries the MCP JSON-RPC stream when
/// serving and the ranked JSON document for `hotscore rank`.
/// Auto-detects format: human-readable with ANSI colors when stderr is a terminal,
/// structured JSON when piped/redirected.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::Config;

/// Initialize tracing subscriber with stderr output and an optional JSON log file
///
/// Format auto-detection:
/// - Terminal: human-readable with ANSI colors
/// - Pipe/redirect: structured JSON
///
/// Log level from config.log_level (default: info)
/// RUST_LOG env var can override at runtime
pub fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut file_error = None;
    let file_layer = match config.log_file.as_deref() {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .json(),
            ),
            Err(e) => {
                file_error = Some((path.to_string(), e));
                None
            }
        },
        None => None,
    };

    let stderr_is_terminal = std::io::stderr().is_terminal();

    if stderr_is_terminal {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
            )
            .init();
    }

    if let Some((path, e)) = file_error {
        tracing::warn!(
            log_file = %path,
            error = %e,
            "Could not open log file, logging to stderr only"
        );
    }
}
