//! Tracing layer that streams log events into the audit buffer.
//!
//! Channel is the lowercased level name; payload is the event's fields plus
//! its target. Events from the audit module and from the HTTP client stack
//! are skipped, otherwise a sync would feed itself.

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::buffer::AuditLogBuffer;

const IGNORED_TARGETS: &[&str] = &[
    "warden_mediator::audit",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio",
];

pub struct AuditMirrorLayer {
    buffer: AuditLogBuffer,
    max_level: Level,
}

impl AuditMirrorLayer {
    pub fn new(buffer: AuditLogBuffer, max_level: Level) -> Self {
        Self { buffer, max_level }
    }

    fn wants(&self, level: &Level, target: &str) -> bool {
        // More verbose levels compare greater.
        *level <= self.max_level && !IGNORED_TARGETS.iter().any(|t| target.starts_with(t))
    }
}

impl<S: Subscriber> Layer<S> for AuditMirrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !self.wants(meta.level(), meta.target()) {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        fields.0.insert("target".into(), Value::String(meta.target().to_string()));

        let channel = meta.level().as_str().to_ascii_lowercase();
        self.buffer.push(&channel, &Value::Object(fields.0));
    }
}

#[derive(Default)]
struct FieldCollector(Map<String, Value>);

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().into(), Value::String(value.into()));
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().into(), Value::Bool(value));
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().into(), Value::from(value));
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().into(), Value::from(value));
    }
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().into(), Value::from(value));
    }
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().into(), Value::String(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn mirrors_events_at_or_above_level() {
        let buffer = AuditLogBuffer::new(4096);
        let subscriber = tracing_subscriber::registry()
            .with(AuditMirrorLayer::new(buffer.clone(), Level::WARN));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "host::plugin", caller = "plugins/x.js", "blocked");
            tracing::info!(target: "host::plugin", "too verbose");
            tracing::error!(target: "warden_mediator::audit::buffer", "self event");
        });

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].channel(), "warn");
        let payload: Value = serde_json::from_str(entries[0].payload()).unwrap();
        assert_eq!(payload["caller"], "plugins/x.js");
        assert_eq!(payload["message"], "blocked");
        assert_eq!(payload["target"], "host::plugin");
    }
}
