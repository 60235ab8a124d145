//! Structured log capability.
//!
//! Services receive an `Arc<dyn StructuredLog>` at construction instead of
//! calling a global logger, so tests can assert on what was logged.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for leveled messages with a JSON object of fields.
pub trait StructuredLog: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: Value);

    fn info(&self, message: &str, fields: Value) {
        self.log(LogLevel::Info, message, fields);
    }

    fn warn(&self, message: &str, fields: Value) {
        self.log(LogLevel::Warn, message, fields);
    }

    fn error(&self, message: &str, fields: Value) {
        self.log(LogLevel::Error, message, fields);
    }
}

/// Forwards to the process-wide `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl StructuredLog for TracingLog {
    fn log(&self, level: LogLevel, message: &str, fields: Value) {
        match level {
            LogLevel::Debug => ::tracing::debug!(fields = %fields, "{message}"),
            LogLevel::Info => ::tracing::info!(fields = %fields, "{message}"),
            LogLevel::Warn => ::tracing::warn!(fields = %fields, "{message}"),
            LogLevel::Error => ::tracing::error!(fields = %fields, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: Value,
}

/// Keeps every record in memory (tests).
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records().into_iter().filter(|r| r.level == level).collect()
    }

    /// First record whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Option<LogRecord> {
        self.records().into_iter().find(|r| r.message.contains(needle))
    }
}

impl StructuredLog for MemoryLog {
    fn log(&self, level: LogLevel, message: &str, fields: Value) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                message: message.to_string(),
                fields,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn memory_log_records_in_order() {
        let log = MemoryLog::new();
        log.info("order created", json!({"order_id": "1"}));
        log.error("deduction failed", json!({"product_id": "X"}));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[1].fields["product_id"], "X");
        assert_eq!(log.at_level(LogLevel::Error).len(), 1);
        assert!(log.find("created").is_some());
    }

    #[test]
    fn usable_as_trait_object() {
        let sinks: Vec<Arc<dyn StructuredLog>> = vec![Arc::new(TracingLog), Arc::new(MemoryLog::new())];
        for sink in sinks {
            sink.warn("heads up", json!({}));
        }
    }
}
