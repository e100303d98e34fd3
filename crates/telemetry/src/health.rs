//! Health check state for the storage backend.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Component health state.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    healthy: AtomicBool,
    message: parking_lot::RwLock<Option<String>>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            healthy: AtomicBool::new(false),
            message: parking_lot::RwLock::new(None),
        }
    }

    pub fn set_healthy(&self) {
        self.healthy.store(true, Ordering::Relaxed);
        *self.message.write() = None;
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.message.write() = Some(msg.into());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> Option<String> {
        self.message.read().clone()
    }
}

/// Point-in-time component health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
}

/// Global health registry. One component: the store every operation of the
/// engine runs against.
pub struct HealthRegistry {
    pub storage: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            storage: ComponentHealth::new("storage"),
        }
    }

    /// Generate a health report.
    pub fn report(&self) -> HealthReport {
        HealthReport {
            name: self.storage.name().to_string(),
            healthy: self.storage.is_healthy(),
            message: self.storage.message(),
        }
    }

    /// Whether batch jobs and queries can be expected to succeed.
    pub fn is_ready(&self) -> bool {
        self.storage.is_healthy()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global health registry.
pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

/// Get the global health registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
