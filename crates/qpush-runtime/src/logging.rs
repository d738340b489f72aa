//! Structured log sink used by providers to report queue activity.
//!
//! Providers report what they did (published, fetched, deleted, reaped) with
//! an HTTP-like status code and a context map. The default sink forwards
//! these entries to `tracing`; hosts can substitute their own sink.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Key/value context attached to a log entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext(BTreeMap<String, Value>);

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a context entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl std::fmt::Display for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = serde_json::to_string(&self.0).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", rendered)
    }
}

/// Destination for provider log entries.
///
/// Logging is fire-and-forget: implementations must not panic and have no way
/// to report failure back to the provider.
pub trait LogSink: Send + Sync {
    fn log(&self, status: u16, message: &str, context: &LogContext);
}

/// Log sink that emits `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, status: u16, message: &str, context: &LogContext) {
        match status {
            500..=u16::MAX => tracing::error!(status, context = %context, "{}", message),
            400..=499 => tracing::warn!(status, context = %context, "{}", message),
            _ => tracing::info!(status, context = %context, "{}", message),
        }
    }
}

/// A log entry captured by [`RecordingLogSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub status: u16,
    pub message: String,
    pub context: LogContext,
}

/// Log sink that keeps every entry in memory
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Entries whose message equals `message`
    pub fn entries_with_message(&self, message: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.message == message)
            .collect()
    }
}

impl LogSink for RecordingLogSink {
    fn log(&self, status: u16, message: &str, context: &LogContext) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogEntry {
                status,
                message: message.to_string(),
                context: context.clone(),
            });
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
