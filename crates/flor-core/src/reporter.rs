//! Reporter trait for dependency injection
//!
//! Core logic reports user-facing status lines through this trait so it is
//! not coupled to a particular terminal front-end. Diagnostics that only
//! matter when debugging go through `tracing` instead.

use std::sync::Mutex;

pub trait Reporter: Send + Sync {
    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn ok(&self, msg: &str);

    /// Log a warning message.
    fn warn(&self, msg: &str);

    /// Log an error message.
    fn err(&self, msg: &str);

    /// Report batch progress. Defaults to an info line.
    fn progress(&self, percent: f64, msg: &str) {
        self.info(&format!("{percent:.1}%: {msg}"));
    }
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn ok(&self, msg: &str) {
        (**self).ok(msg);
    }
    fn warn(&self, msg: &str) {
        (**self).warn(msg);
    }
    fn err(&self, msg: &str) {
        (**self).err(msg);
    }
    fn progress(&self, percent: f64, msg: &str) {
        (**self).progress(percent, msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _: &str) {}
    fn ok(&self, _: &str) {}
    fn warn(&self, _: &str) {}
    fn err(&self, _: &str) {}
}

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Ok,
    Warn,
    Err,
}

/// Keeps every message in memory. Handy for asserting on output in tests.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages recorded so far.
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Messages recorded at `level`.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, level: Level, msg: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, msg.to_string()));
        }
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }
    fn ok(&self, msg: &str) {
        self.push(Level::Ok, msg);
    }
    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }
    fn err(&self, msg: &str) {
        self.push(Level::Err, msg);
    }
}
