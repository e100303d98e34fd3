//! Query router for the rollup engine.
//!
//! Answers the two recurring report questions — ranked worst offenders over
//! a lookback window, and recent raw samples for one offender — choosing per
//! request whether the compact rollups or the raw event log serve the view.

pub mod detail;
pub mod offenders;
pub mod router;

pub use detail::*;
pub use offenders::*;
pub use router::*;
