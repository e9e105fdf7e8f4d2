//! Logging initialization for the CLI.
//!
//! This module re-exports the telemetry crate's initialization functions.
//! The CLI writes structured JSONL to `~/.fillway/logs/cli.jsonl`.

#[allow(unused_imports)]
pub use telemetry::{init, init_with_config, LogConfig};

/// Initialize the logging system for the CLI.
///
/// This sets up tracing with:
/// - Structured JSONL output to `~/.fillway/logs/cli.jsonl`
/// - Log level from RUST_LOG env var or the provided default
/// - Service name included in every log line
///
/// # Arguments
///
/// * `level` - Default log level (trace, debug, info, warn, error)
pub fn init_logging(level: &str) {
    telemetry::init_with_config(telemetry::LogConfig {
        service_name: "cli".into(),
        default_level: level.into(),
        also_stderr: false,
        ..Default::default()
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
