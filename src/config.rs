use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Fields, Result};

/// Environment name that switches output to JSON.
pub const PRODUCTION: &str = "production";
/// Environment variable consulted when `environment_name` is blank.
pub const ENVIRONMENT_NAME_VAR: &str = "ENVIRONMENT_NAME";
/// Environment variable consulted when `logstash_port` is blank.
pub const LOGSTASH_PORT_VAR: &str = "LOGSTASH_PORT";

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_LOGSTASH_PORT: &str = "5000";

/// Configuration for a service logger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the service, attached to every line as `service_name`
    pub service_name: String,
    /// Deployment environment ("production" selects JSON output)
    #[serde(default)]
    pub environment_name: String,
    /// Logstash host; blank disables remote shipping
    #[serde(default)]
    pub logstash_server: String,
    /// Logstash port
    #[serde(default)]
    pub logstash_port: String,
    /// Minimum log level (e.g., "info", "debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fields attached to every line
    #[serde(default)]
    pub default_fields: Fields,
}

impl Config {
    /// Create a new Config for `service_name` with defaults
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            environment_name: String::new(),
            logstash_server: String::new(),
            logstash_port: String::new(),
            log_level: default_log_level(),
            default_fields: Fields::new(),
        }
    }

    /// Set environment name
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment_name = environment.into();
        self
    }

    /// Set Logstash host and port
    pub fn with_logstash(mut self, server: impl Into<String>, port: impl Into<String>) -> Self {
        self.logstash_server = server.into();
        self.logstash_port = port.into();
        self
    }

    /// Set log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Add a default field
    pub fn with_default_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_fields.insert(key.into(), value.into());
        self
    }

    /// Replace all default fields
    pub fn with_default_fields(mut self, fields: Fields) -> Self {
        self.default_fields = fields;
        self
    }

    /// Reject a blank service name. Nothing else is checked.
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(Error::Config(
                "Required attribute 'service_name' missing on logger config".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective environment name.
    pub fn environment(&self) -> String {
        value_or_default(
            &self.environment_name,
            ENVIRONMENT_NAME_VAR,
            DEFAULT_ENVIRONMENT,
        )
    }

    /// Effective Logstash port.
    pub fn port(&self) -> String {
        value_or_default(&self.logstash_port, LOGSTASH_PORT_VAR, DEFAULT_LOGSTASH_PORT)
    }

    /// Whether a remote hook target is configured at all.
    pub fn has_logstash(&self) -> bool {
        !self.logstash_server.trim().is_empty()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Trimmed `configured` if non-blank, else the trimmed environment variable
/// `var` if non-blank, else `default`.
pub fn value_or_default(configured: &str, var: &str, default: &str) -> String {
    value_or_default_with(configured, var, default, |name| std::env::var(name).ok())
}

fn value_or_default_with<F>(configured: &str, var: &str, default: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let configured = configured.trim();
    if !configured.is_empty() {
        return configured.to_string();
    }

    match lookup(var) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}
