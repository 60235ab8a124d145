//! Tracing and structured logging (shared setup).

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Structured log capability injected into services.
pub mod logging;

pub use logging::{LogLevel, LogRecord, MemoryLog, StructuredLog, TracingLog};
