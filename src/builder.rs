//! Builder pattern for constructing a service logger.
//!
//! This module provides a convenient builder API for configuring a
//! [`Logger`] in a single chain of method calls, including output
//! redirection and extra hooks that a plain [`Config`] cannot express.
//!
//! # Example
//!
//! ```rust,no_run
//! use svclog::Log;
//!
//! let logger = svclog::builder("billing")
//!     .with_environment("production")
//!     .with_level("debug")
//!     .with_default_field("region", "eu-west-1")
//!     .init();
//!
//! logger.info("started");
//! ```

use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

use crate::logger::configure;
use crate::{Backend, Config, Hook, Logger, Result};

/// A builder for configuring and constructing a [`Logger`].
pub struct LoggerBuilder {
    config: Config,
    backend: Box<dyn FnOnce(Backend) -> Backend>,
}

impl LoggerBuilder {
    /// Create a new LoggerBuilder for `service_name` with default configuration.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::from_config(Config::new(service_name))
    }

    /// Create a LoggerBuilder from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            backend: Box::new(|backend| backend),
        }
    }

    /// Set the environment name ("production" selects JSON output).
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.config = self.config.with_environment(environment);
        self
    }

    /// Set the log level (e.g., "trace", "debug", "info", "warn", "error").
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config = self.config.with_level(level);
        self
    }

    /// Ship records to a Logstash TCP input.
    pub fn with_logstash(mut self, server: impl Into<String>, port: impl Into<String>) -> Self {
        self.config = self.config.with_logstash(server, port);
        self
    }

    /// Add a field attached to every line.
    pub fn with_default_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config = self.config.with_default_field(key, value);
        self
    }

    /// Write lines to `writer` instead of stderr.
    pub fn with_writer<W>(self, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.map_backend(move |backend| backend.with_writer(writer))
    }

    /// Register an additional hook, fired after the Logstash hook.
    pub fn with_hook(self, hook: impl Hook + 'static) -> Self {
        self.map_backend(move |backend| backend.with_hook(Box::new(hook)))
    }

    fn map_backend<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Backend) -> Backend + 'static,
    {
        let previous = self.backend;
        self.backend = Box::new(move |backend| f(previous(backend)));
        self
    }

    /// Get the current configuration without constructing.
    pub fn build(self) -> Config {
        self.config
    }

    /// Construct the logger.
    ///
    /// # Errors
    ///
    /// Returns an error if the service name is blank.
    pub fn try_init(self) -> Result<Logger> {
        self.config.validate()?;
        let backend = (self.backend)(configure(&self.config));
        Ok(Logger::from_backend(&self.config, backend))
    }

    /// Construct the logger, exiting the process if the service name is blank.
    pub fn init(self) -> Logger {
        match self.try_init() {
            Ok(logger) => logger,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1)
            }
        }
    }
}

impl std::fmt::Debug for LoggerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
