//! Injectable diagnostics reporting.
//!
//! Import failures are not fatal: they surface through a caller-supplied
//! sink carrying a severity and a human-readable message. The default
//! [`LogSink`] forwards to the `log` crate; [`MemorySink`] collects
//! messages for inspection in tests and tooling.

use std::sync::Mutex;

/// Severity attached to a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Receiver for out-of-band diagnostics.
pub trait DiagnosticsSink {
    fn report(&self, severity: Severity, message: &str);
}

/// Default sink forwarding every diagnostic to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => log::info!("{}", message),
            Severity::Warning => log::warn!("{}", message),
            Severity::Error => log::error!("{}", message),
        }
    }
}

/// Sink that retains every reported diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything reported so far.
    pub fn entries(&self) -> Vec<(Severity, String)> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl DiagnosticsSink for MemorySink {
    fn report(&self, severity: Severity, message: &str) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((severity, message.to_string()));
    }
}
