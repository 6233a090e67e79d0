//! Builders
//!
//! Fluent configuration builder.

pub mod config;

pub use config::AuthConfigBuilder;
