//! Injected structured logging for extraction and matching components.
//!
//! Components never reach for a process-wide logger. Each one is handed an
//! [`EventSink`] at construction and emits [`LogRecord`]s tagged with its
//! component name through an [`EventLog`] handle. [`TracingSink`] forwards
//! to `tracing`; [`MemorySink`] keeps records for inspection.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// One structured log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub component: &'static str,
    pub message: String,
}

/// Destination for [`LogRecord`]s.
pub trait EventSink: Send + Sync {
    fn record(&self, record: LogRecord);
}

/// Forwards records to the `tracing` facade with a `component` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, record: LogRecord) {
        let LogRecord {
            severity,
            component,
            message,
        } = record;
        match severity {
            Severity::Debug => tracing::debug!(component, "{message}"),
            Severity::Info => tracing::info!(component, "{message}"),
            Severity::Warn => tracing::warn!(component, "{message}"),
            Severity::Error => tracing::error!(component, "{message}"),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records emitted by `component` at `severity` or above.
    pub fn matching(&self, component: &str, severity: Severity) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.component == component && r.severity >= severity)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, record: LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

/// Sink handle bound to one component name.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<dyn EventSink>,
    component: &'static str,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl EventLog {
    pub fn new(sink: Arc<dyn EventSink>, component: &'static str) -> Self {
        Self { sink, component }
    }

    /// Handle for another component sharing the same sink.
    pub fn for_component(&self, component: &'static str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            component,
        }
    }

    pub fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.sink)
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        self.sink.record(LogRecord {
            severity,
            component: self.component,
            message: message.into(),
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Severity::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Severity::Warn, message);
    }
}

/// Default sink: forward to `tracing`.
pub fn tracing_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingSink)
}
