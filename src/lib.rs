//! # Svclog
//!
//! A structured logging facade that stamps every line with a service name
//! and a set of default and contextual fields.
//!
//! ## Features
//!
//! - Root [`Logger`] with default fields, derived [`Entry`] views per unit of work
//! - `service_name` is always present and always the configured one
//! - Text output in development, JSON in production
//! - Optional asynchronous shipping to Logstash over TCP with reconnect backoff
//! - Bridge for events from the `tracing` ecosystem
//!
//! ## Example
//!
//! ```rust
//! use svclog::{Config, Log, Logger, fields};
//!
//! let config = Config::new("billing").with_default_field("env", "staging");
//! let logger = Logger::try_new(&config)?;
//!
//! let request = logger.with_fields(fields! { "req_id" => "123" });
//! request.info("charging card");
//! request.warn(svclog::message!["retry", 2]);
//! # Ok::<(), svclog::Error>(())
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod error;
pub mod fields;
pub mod format;
pub mod level;
pub mod logger;
pub mod logstash;
pub mod tracing_init;

pub use backend::{Backend, Hook};
pub use builder::LoggerBuilder;
pub use config::Config;
pub use error::{Error, Result};
pub use fields::{Fields, Message, SERVICE_NAME_KEY, merge_fields};
pub use format::{Formatter, Record};
pub use level::Level;
pub use logger::{Entry, Log, Logger};
pub use logstash::{LogstashHook, LogstashWriter, ReconnectPolicy};
pub use tracing_init::{TracingBridge, init_tracing};

#[doc(hidden)]
pub use serde_json;

/// Start a [`LoggerBuilder`] for `service_name`.
pub fn builder(service_name: impl Into<String>) -> LoggerBuilder {
    LoggerBuilder::new(service_name)
}

/// Build a [`Fields`] map from `key => value` pairs.
///
/// Values go through `serde_json::json!`, so anything serializable works.
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(::std::string::ToString::to_string(&$key), $crate::serde_json::json!($value));
        )+
        fields
    }};
}

/// Build a [`Message`] from a list of loosely typed values.
#[macro_export]
macro_rules! message {
    ($($item:expr),* $(,)?) => {
        $crate::Message::from(::std::vec![$($crate::serde_json::json!($item)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_macro() {
        let fields = fields! { "req_id" => "123", "attempt" => 2, "ok" => true };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["req_id"], json!("123"));
        assert_eq!(fields["attempt"], json!(2));
        assert!(fields!().is_empty());
    }

    #[test]
    fn test_message_macro() {
        let msg = message!["user", 42];
        assert_eq!(msg.items(), &[json!("user"), json!(42)]);
        assert_eq!(msg.to_string(), "[user 42]");
        assert!(message![].is_empty());
    }
}
