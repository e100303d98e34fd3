//! Batch side of the rollup engine.
//!
//! - Rollup builder: compresses one day of raw samples into daily aggregates
//! - Retention sweeper: enforces the raw and rollup horizons
//! - Daily job: the builder-then-sweeper sequence the external scheduler runs

pub mod job;
pub mod retention;
pub mod rollup;

pub use job::*;
pub use retention::*;
pub use rollup::*;
