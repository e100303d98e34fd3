//! Field and query limits for the rollup engine.
//!
//! # Usage Note
//!
//! The `#[validate]` derive macro requires literal values in attributes, so
//! field limits are duplicated there. Keep both in sync when modifying.

// === String Field Limits (chars) ===

/// Target selector max length. Also the cap applied to `page_path` when a
/// raw URL is collapsed into a rollup key.
pub const MAX_SELECTOR_LEN: usize = 255;

/// Interaction type tag max length ("click", "keydown", ...).
pub const MAX_INTERACTION_TYPE_LEN: usize = 32;

/// Implicated script URL max length.
pub const MAX_SCRIPT_URL_LEN: usize = 255;

/// Page path max length inside a rollup key.
pub const MAX_PAGE_PATH_LEN: usize = 255;

// === Query Limits ===

/// Hard cap on rows returned by a single report query page.
pub const MAX_QUERY_LIMIT: u32 = 2000;

/// Default page size for report queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 50;
