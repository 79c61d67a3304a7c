//! The configured engine behind a [`Logger`](crate::Logger).

use std::fmt;
use std::io::Write;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::{Formatter, Level, Record, Result};

/// A side-channel sink that sees every enabled record.
pub trait Hook: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Levels this hook wants. Defaults to all of them.
    fn levels(&self) -> &[Level] {
        &Level::ALL
    }

    fn fire(&self, record: &Record) -> Result<()>;
}

/// Level, format, writer and hooks, fixed at construction and shared by
/// every logger view derived from it.
pub struct Backend {
    level: Level,
    formatter: Formatter,
    writer: BoxMakeWriter,
    hooks: Vec<Box<dyn Hook>>,
}

impl Backend {
    /// A backend writing to stderr with no hooks.
    pub fn new(level: Level, formatter: Formatter) -> Self {
        Self {
            level,
            formatter,
            writer: BoxMakeWriter::new(std::io::stderr),
            hooks: Vec::new(),
        }
    }

    /// Send output to `writer` instead of stderr.
    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.writer = BoxMakeWriter::new(writer);
        self
    }

    /// Register `hook`; hooks fire in registration order.
    pub fn with_hook(mut self, hook: Box<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Minimum level emitted.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Line format used for local output.
    pub fn formatter(&self) -> Formatter {
        self.formatter
    }

    /// Installed hooks, in firing order.
    pub fn hooks(&self) -> &[Box<dyn Hook>] {
        &self.hooks
    }

    /// Fatal and panic always pass; everything else is checked against the
    /// configured minimum.
    pub fn enabled(&self, level: Level) -> bool {
        level >= Level::Fatal || level.is_enabled_for(self.level)
    }

    /// Fire hooks, then write one formatted line. Failures go to stderr.
    pub fn emit(&self, record: &Record) {
        if !self.enabled(record.level) {
            return;
        }

        for hook in &self.hooks {
            if !hook.levels().contains(&record.level) {
                continue;
            }
            if let Err(e) = hook.fire(record) {
                eprintln!("Failed to fire hook {}: {}", hook.name(), e);
            }
        }

        let mut buf = Vec::with_capacity(256);
        self.formatter.format(record, &mut buf);
        let mut writer = self.writer.make_writer();
        if let Err(e) = writer.write_all(&buf) {
            eprintln!("Failed to write to log, {}", e);
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("level", &self.level)
            .field("formatter", &self.formatter)
            .field(
                "hooks",
                &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
