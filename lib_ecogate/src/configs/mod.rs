//! # Configuration Modules
//!
//! Process-wide capacity configuration: per-sensitivity policies and per-site
//! overrides, owned by a `PolicyService` and persisted as a versioned JSON file.

/// Sensitivity policies, capacity overrides and their load/save lifecycle.
pub mod policy;

pub use policy::{ConfigError, PolicyConfig, PolicyService, SensitivityPolicy};
