//! Telemetry
//!
//! Structured logging with principal/operation context.

pub mod logging;

pub use logging::{
    AuthLogContext, InMemoryLogger, LogEntry, LogLevel, Logger, NoOpLogger, TracingLogger,
};
