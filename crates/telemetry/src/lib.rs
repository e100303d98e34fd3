//! Internal telemetry for the rollup engine.
//!
//! Instead of an external metrics system, counters are collected in-memory
//! and a snapshot is flushed to the engine's own store at the end of each
//! batch run.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
