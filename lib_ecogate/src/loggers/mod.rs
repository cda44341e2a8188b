//! # Logging Setup
//!
//! Installs the process-wide `tracing` subscriber for the binaries: a console
//! layer plus a JSON file layer on a daily-rolling non-blocking appender.

/// Subscriber initialisation and old log cleanup.
pub mod setup;

pub use setup::{cleanup_old_logs, setup_logging, LoggingError};
