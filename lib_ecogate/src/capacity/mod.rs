//! # Capacity Policy Engine
//!
//! - **`factors`**: the six pure factor functions.
//! - **`calculator`**: synchronous evaluation and eligibility rules.
//! - **`engine`**: the async façade that fetches inputs, keeps the
//!   adjustment log and raises capacity alerts.

use thiserror::Error;

use crate::configs::ConfigError;
use crate::store::StoreError;

pub mod calculator;
pub mod engine;
pub mod factors;

pub use calculator::CapacityCalculator;
pub use engine::CapacityEngine;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("Site '{0}' not found")]
    UnknownSite(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
