//! Core types, percentile engine, and store contracts for the rollup engine.

pub mod error;
pub mod event;
pub mod limits;
pub mod percentile;
pub mod retention;
pub mod rollup;
pub mod store;

pub use error::{Error, Result};
pub use event::*;
pub use percentile::*;
pub use retention::*;
pub use rollup::*;
pub use store::*;
