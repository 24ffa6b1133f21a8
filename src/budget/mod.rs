//! Power budgeting and channel admission.
//!
//! Everything in here is a pure function of an immutable [`PowerBudget`]
//! and the caller's snapshot (battery SOC, live solar output, channels
//! already on). There is no I/O and no interior mutability, so one budget
//! can be shared behind an `Arc` by every request handler.

pub mod admission;
pub mod normalizer;
pub mod selector;

pub use admission::AvailabilityMap;
pub use normalizer::NormalizedBudget;
pub use selector::ChannelSelection;

use thiserror::Error;

use crate::domain::{ChannelConfig, SystemConfig};

/// Errors raised by the budgeting core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Per-call replacements for configured values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetOverrides {
    pub channels: Option<ChannelConfig>,
    pub duration_minutes: Option<f64>,
}

impl BudgetOverrides {
    pub fn duration(duration_minutes: f64) -> Self {
        Self {
            channels: None,
            duration_minutes: Some(duration_minutes),
        }
    }
}

/// Immutable budgeting configuration, bound once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerBudget {
    system: SystemConfig,
    channels: ChannelConfig,
}

impl PowerBudget {
    pub fn new(system: SystemConfig, channels: ChannelConfig) -> Self {
        Self { system, channels }
    }

    pub fn system(&self) -> &SystemConfig {
        &self.system
    }

    pub fn channels(&self) -> &ChannelConfig {
        &self.channels
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Four channels, 100 Wh battery, 60 minute window, 20 % protection.
    pub fn reference_budget() -> PowerBudget {
        PowerBudget::new(
            SystemConfig {
                battery_capacity_wh: 100.0,
                duration_minutes: 60.0,
                battery_protection_threshold: 20.0,
            },
            ChannelConfig::new([("A", 50.0), ("B", 30.0), ("C", 20.0), ("D", 10.0)]),
        )
    }
}
