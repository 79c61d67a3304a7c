use std::fmt;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{Error, Fields, Level, Log, Logger, Message, Result};

/// A `tracing` layer that routes events through a [`Logger`], so they carry
/// the service name and default fields like any other line.
///
/// Events emitted by this crate itself are skipped.
#[derive(Debug, Clone)]
pub struct TracingBridge {
    logger: Logger,
}

impl TracingBridge {
    /// Route events through `logger`.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for TracingBridge {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = match visitor.message {
            Some(message) => Message::from(message),
            None => Message::default(),
        };
        let level = Level::from(*metadata.level());
        if visitor.fields.is_empty() {
            self.logger.log(level, message);
        } else {
            self.logger.with_fields(visitor.fields).log(level, message);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Fields,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

/// Install `logger` as the global `tracing` subscriber.
///
/// `RUST_LOG` filters events when set; otherwise the logger's own level does.
pub fn init_tracing(logger: &Logger) -> Result<()> {
    let log_spec = effective_log_spec(logger.backend().level());
    let env_filter = EnvFilter::try_new(&log_spec).map_err(|e| Error::Init(e.to_string()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(TracingBridge::new(logger.clone()))
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))?;

    Ok(())
}

/// Determine the effective filter directive for the bridge.
fn effective_log_spec(level: Level) -> String {
    log_spec(level, std::env::var("RUST_LOG").ok())
}

fn log_spec(level: Level, rust_log: Option<String>) -> String {
    // RUST_LOG takes precedence over the configured level
    if let Some(rust_log) = rust_log
        && !rust_log.is_empty()
    {
        return rust_log;
    }

    level.to_tracing_filter().to_string()
}
