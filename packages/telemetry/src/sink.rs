//! Event capture sink abstraction.
//!
//! The auth core reports structured events and errors through this trait.
//! Concrete remote exporters (product analytics, crash reporting) live
//! outside this repository and plug in here.

use serde_json::Value;
use tracing::{error, info};

/// Destination for captured telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Record a named product event with structured properties.
    fn capture_event(&self, name: &str, properties: Value);

    /// Record an error with its stable code and diagnostic payload.
    fn capture_error(&self, code: &str, message: &str, details: Value);
}

/// Sink that forwards captures to the structured log stream.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn capture_event(&self, name: &str, properties: Value) {
        info!(target: "telemetry", name = %name, properties = %properties, "captured event");
    }

    fn capture_error(&self, code: &str, message: &str, details: Value) {
        error!(target: "telemetry", code = %code, details = %details, "{}", message);
    }
}

/// Sink that discards everything.
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn capture_event(&self, _name: &str, _properties: Value) {}

    fn capture_error(&self, _code: &str, _message: &str, _details: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop_sink_accepts_everything() {
        let sink = NoopSink;
        sink.capture_event("auth.signed_in", json!({ "user_id": "u1" }));
        sink.capture_error("timeout", "timed out", Value::Null);
    }

    #[test]
    fn test_log_sink_is_object_safe() {
        let sink: Box<dyn TelemetrySink> = Box::new(LogSink);
        sink.capture_event("auth.signed_out", json!({}));
    }
}
