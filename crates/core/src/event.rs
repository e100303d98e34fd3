//! Raw interaction sample definitions.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::limits::{MAX_INTERACTION_TYPE_LEN, MAX_SCRIPT_URL_LEN, MAX_SELECTOR_LEN};

/// Device classification reported by the client.
///
/// Anything outside the fixed enumeration coerces to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    #[default]
    Other,
}

impl DeviceClass {
    /// Parse a client-reported tag, coercing unrecognized values to `Other`.
    pub fn coerce(tag: &str) -> Self {
        match tag {
            "desktop" => Self::Desktop,
            "mobile" => Self::Mobile,
            "tablet" => Self::Tablet,
            _ => Self::Other,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One web-interaction latency sample (an INP measurement).
///
/// Events arrive here already validated by the intake layer; the bounds below
/// re-state the stored shape. Immutable once stored, deleted by the retention
/// sweeper past the raw horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RawEvent {
    /// Unique event ID
    pub event_id: Uuid,
    /// Interaction timestamp, UTC, second precision
    pub timestamp: DateTime<Utc>,
    /// URL or path as reported by the client; may carry a query string
    pub page_url: String,
    /// Short interaction tag ("click", "keydown", ...)
    #[validate(length(max = 32))]
    pub interaction_type: String,
    /// Tag/id/class composite of the DOM target; may be empty
    #[validate(length(max = 255))]
    pub target_selector: String,
    /// Measured interaction latency in milliseconds
    pub inp_ms: u32,
    /// Longest long-task observed around the interaction, if any
    pub long_task_ms: Option<u32>,
    /// Script implicated in the slow interaction, if attributed
    #[validate(length(max = 255))]
    pub script_url: Option<String>,
    /// Device classification
    pub device_class: DeviceClass,
    /// Fraction of traffic this sample represents, percent in [1,100].
    /// Informational only; aggregates are not reweighted by it.
    #[validate(range(min = 1, max = 100))]
    pub sample_rate: u8,
}

impl RawEvent {
    /// Build a sample from client-reported fields, applying the same
    /// coercions the intake layer guarantees: strings truncated to their
    /// caps, unknown device classes coerced to `other`, timestamps rounded
    /// to whole seconds, sample rate defaulted to 100.
    #[allow(clippy::too_many_arguments)]
    pub fn sanitized(
        timestamp: DateTime<Utc>,
        page_url: impl Into<String>,
        interaction_type: &str,
        target_selector: &str,
        inp_ms: u32,
        long_task_ms: Option<u32>,
        script_url: Option<&str>,
        device_class: &str,
        sample_rate: Option<u8>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: timestamp.trunc_subsecs(0),
            page_url: page_url.into(),
            interaction_type: truncate_chars(interaction_type, MAX_INTERACTION_TYPE_LEN),
            target_selector: truncate_chars(target_selector, MAX_SELECTOR_LEN),
            inp_ms,
            long_task_ms,
            script_url: script_url.map(|s| truncate_chars(s, MAX_SCRIPT_URL_LEN)),
            device_class: DeviceClass::coerce(device_class),
            sample_rate: sample_rate.unwrap_or(100).clamp(1, 100),
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
