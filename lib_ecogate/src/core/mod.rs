//! # Core Event Plumbing
//!
//! - **`dispatcher`**: zero-copy fan-out of `CapacityEvent`s to every
//!   subscriber (WebSocket sessions, log sinks, tests). Publishing never fails
//!   and never blocks; disconnected or hopelessly slow subscribers are dropped.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Fan-out broadcaster for capacity and weather events.
pub mod dispatcher;

pub use dispatcher::{CapacityEvent, Dispatcher, EventKind, EventSubscription};
