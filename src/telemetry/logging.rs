//! Logging
//!
//! Structured logging for token lifecycle operations. The logger is an
//! injected service; callers construct one at startup and hand it to the
//! manager and client.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::types::now_ms;

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Context attached to every log line. Never put token values in here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthLogContext {
    /// Principal the operation acts for.
    pub principal: Option<String>,
    /// Operation name.
    pub operation: Option<String>,
    /// Additional context.
    pub extra: BTreeMap<String, String>,
}

impl AuthLogContext {
    /// Create new log context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for an operation on behalf of a principal.
    pub fn for_principal(principal: &str, operation: &str) -> Self {
        Self::new().principal(principal).operation(operation)
    }

    /// Set principal.
    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Set operation.
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Add extra context.
    pub fn extra(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.insert(key.into(), value.to_string());
        self
    }

    fn format_extra(&self) -> String {
        self.extra
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Logger interface.
pub trait Logger: Send + Sync {
    fn trace(&self, message: &str, context: &AuthLogContext);

    fn debug(&self, message: &str, context: &AuthLogContext);

    fn info(&self, message: &str, context: &AuthLogContext);

    fn warn(&self, message: &str, context: &AuthLogContext);

    fn error(&self, message: &str, context: &AuthLogContext);

    /// Check if a log level is enabled.
    fn is_enabled(&self, level: LogLevel) -> bool;
}

/// No-op logger implementation.
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn trace(&self, _message: &str, _context: &AuthLogContext) {}
    fn debug(&self, _message: &str, _context: &AuthLogContext) {}
    fn info(&self, _message: &str, _context: &AuthLogContext) {}
    fn warn(&self, _message: &str, _context: &AuthLogContext) {}
    fn error(&self, _message: &str, _context: &AuthLogContext) {}
    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// Logger that forwards to the `tracing` subscriber installed by the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

macro_rules! forward {
    ($macro:ident, $message:expr, $context:expr) => {
        tracing::$macro!(
            principal = $context.principal.as_deref().unwrap_or("-"),
            operation = $context.operation.as_deref().unwrap_or("-"),
            extra = %$context.format_extra(),
            "{}",
            $message
        )
    };
}

impl Logger for TracingLogger {
    fn trace(&self, message: &str, context: &AuthLogContext) {
        forward!(trace, message, context);
    }

    fn debug(&self, message: &str, context: &AuthLogContext) {
        forward!(debug, message, context);
    }

    fn info(&self, message: &str, context: &AuthLogContext) {
        forward!(info, message, context);
    }

    fn warn(&self, message: &str, context: &AuthLogContext) {
        forward!(warn, message, context);
    }

    fn error(&self, message: &str, context: &AuthLogContext) {
        forward!(error, message, context);
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Trace => tracing::enabled!(tracing::Level::TRACE),
            LogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            LogLevel::Warn => tracing::enabled!(tracing::Level::WARN),
            LogLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }
}

/// Log entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub context: AuthLogContext,
    pub timestamp: u64,
}

impl LogEntry {
    /// Message and context rendered as one line, for content assertions.
    pub fn render(&self) -> String {
        format!(
            "{} {} principal={} operation={} {}",
            self.level,
            self.message,
            self.context.principal.as_deref().unwrap_or("-"),
            self.context.operation.as_deref().unwrap_or("-"),
            self.context.format_extra()
        )
    }
}

/// In-memory logger for testing.
pub struct InMemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
    min_level: LogLevel,
}

impl InMemoryLogger {
    /// Create new in-memory logger.
    pub fn new() -> Self {
        Self::with_level(LogLevel::Trace)
    }

    /// Create in-memory logger with minimum level.
    pub fn with_level(min_level: LogLevel) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            min_level,
        }
    }

    /// Get all log entries.
    pub fn get_entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Get entries by level.
    pub fn get_entries_by_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Whether any entry mentions `needle` in its message or context.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.render().contains(needle))
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, level: LogLevel, message: &str, context: &AuthLogContext) {
        if level >= self.min_level {
            self.lock().push(LogEntry {
                level,
                message: message.to_string(),
                context: context.clone(),
                timestamp: now_ms(),
            });
        }
    }
}

impl Default for InMemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for InMemoryLogger {
    fn trace(&self, message: &str, context: &AuthLogContext) {
        self.log(LogLevel::Trace, message, context);
    }

    fn debug(&self, message: &str, context: &AuthLogContext) {
        self.log(LogLevel::Debug, message, context);
    }

    fn info(&self, message: &str, context: &AuthLogContext) {
        self.log(LogLevel::Info, message, context);
    }

    fn warn(&self, message: &str, context: &AuthLogContext) {
        self.log(LogLevel::Warn, message, context);
    }

    fn error(&self, message: &str, context: &AuthLogContext) {
        self.log(LogLevel::Error, message, context);
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}
