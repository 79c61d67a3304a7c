//! Root loggers, derived entries and the shared [`Log`] interface.

use std::sync::Arc;

use crate::logstash::install_hook;
use crate::{Backend, Config, Fields, Formatter, Level, Message, Record, Result, merge_fields};

/// Leveled, field-carrying logging shared by [`Logger`] and [`Entry`].
pub trait Log {
    /// Derive an [`Entry`] carrying `fields` on top of this view's fields.
    fn with_fields(&self, fields: Fields) -> Entry;

    /// Merge fields and hand one record to the backend.
    fn log(&self, level: Level, message: Message);

    fn trace(&self, message: impl Into<Message>)
    where
        Self: Sized,
    {
        self.log(Level::Trace, message.into());
    }

    fn debug(&self, message: impl Into<Message>)
    where
        Self: Sized,
    {
        self.log(Level::Debug, message.into());
    }

    fn info(&self, message: impl Into<Message>)
    where
        Self: Sized,
    {
        self.log(Level::Info, message.into());
    }

    fn warn(&self, message: impl Into<Message>)
    where
        Self: Sized,
    {
        self.log(Level::Warn, message.into());
    }

    fn error(&self, message: impl Into<Message>)
    where
        Self: Sized,
    {
        self.log(Level::Error, message.into());
    }

    /// Log at fatal level, then exit the process with status 1.
    fn fatal(&self, message: impl Into<Message>) -> !
    where
        Self: Sized,
    {
        self.log(Level::Fatal, message.into());
        std::process::exit(1)
    }

    /// Log at panic level, then panic with the rendered message.
    fn panic(&self, message: impl Into<Message>) -> !
    where
        Self: Sized,
    {
        let message = message.into();
        let rendered = message.to_string();
        self.log(Level::Panic, message);
        panic!("{}", rendered)
    }
}

/// Process-level logger holding the service name and default fields.
#[derive(Debug, Clone)]
pub struct Logger {
    backend: Arc<Backend>,
    service_name: Arc<str>,
    defaults: Fields,
}

impl Logger {
    /// Build a logger from `config`, writing to stderr.
    ///
    /// A blank service name is fatal: the error is printed and the process
    /// exits with status 1. Use [`Logger::try_new`] to handle it instead.
    pub fn new(config: &Config) -> Self {
        match Self::try_new(config) {
            Ok(logger) => logger,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1)
            }
        }
    }

    /// Build a logger from `config`, failing on a blank service name.
    ///
    /// Level, environment and Logstash settings never fail; they fall back
    /// to defaults.
    pub fn try_new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_backend(config, configure(config)))
    }

    /// Wrap an already configured backend. `config` only supplies the
    /// service name and default fields.
    pub fn from_backend(config: &Config, backend: Backend) -> Self {
        Self {
            backend: Arc::new(backend),
            service_name: Arc::from(config.service_name.as_str()),
            defaults: config.default_fields.clone(),
        }
    }

    /// The configured service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Fields stamped on every line, before `service_name` is added.
    pub fn default_fields(&self) -> &Fields {
        &self.defaults
    }

    /// The shared backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

impl Log for Logger {
    fn with_fields(&self, fields: Fields) -> Entry {
        Entry {
            backend: Arc::clone(&self.backend),
            fields: merge_fields(&self.defaults, &fields, &self.service_name),
            service_name: Arc::clone(&self.service_name),
        }
    }

    fn log(&self, level: Level, message: Message) {
        let fields = merge_fields(&self.defaults, &Fields::new(), &self.service_name);
        self.backend.emit(&Record::new(level, message, fields));
    }
}

/// A logger view bound to extra fields, usually one per unit of work.
#[derive(Debug, Clone)]
pub struct Entry {
    backend: Arc<Backend>,
    service_name: Arc<str>,
    fields: Fields,
}

impl Entry {
    /// Merged fields, `service_name` included.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Same as [`Logger::service_name`] of the parent.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Log for Entry {
    fn with_fields(&self, fields: Fields) -> Entry {
        Entry {
            backend: Arc::clone(&self.backend),
            fields: merge_fields(&self.fields, &fields, &self.service_name),
            service_name: Arc::clone(&self.service_name),
        }
    }

    fn log(&self, level: Level, message: Message) {
        let fields = merge_fields(&self.fields, &Fields::new(), &self.service_name);
        self.backend.emit(&Record::new(level, message, fields));
    }
}

/// Map `config` onto a stderr backend: level with info fallback, formatter
/// by environment, Logstash hook when reachable.
pub fn configure(config: &Config) -> Backend {
    let backend = Backend::new(
        Level::resolve(&config.log_level),
        Formatter::for_environment(&config.environment()),
    );
    match install_hook(config) {
        Some(hook) => backend.with_hook(Box::new(hook)),
        None => backend,
    }
}
