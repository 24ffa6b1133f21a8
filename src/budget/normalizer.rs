use tracing::debug;

use super::{BudgetError, BudgetOverrides, PowerBudget};
use crate::domain::ChannelConfig;

/// Power available for one decision, with the defaults it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBudget<'a> {
    /// Stored energy spread over the window plus live generation, watts.
    pub available_power_w: f64,
    pub channels: &'a ChannelConfig,
    pub duration_minutes: f64,
}

impl PowerBudget {
    /// Validates the snapshot and converts it into an available-power figure.
    ///
    /// Live generation is added as-is to the battery discharge rate; it is an
    /// instantaneous snapshot, not a forecast.
    pub fn normalize<'a>(
        &'a self,
        battery: f64,
        power: f64,
        overrides: &'a BudgetOverrides,
    ) -> Result<NormalizedBudget<'a>, BudgetError> {
        if !(0.0..=100.0).contains(&battery) {
            return Err(BudgetError::InvalidInput(format!(
                "battery must be within 0-100 %, got {battery}"
            )));
        }
        if !power.is_finite() || power < 0.0 {
            return Err(BudgetError::InvalidInput(format!(
                "power must be a non-negative wattage, got {power}"
            )));
        }

        let channels = match &overrides.channels {
            Some(channels) => {
                channels.check_draws().map_err(BudgetError::InvalidInput)?;
                channels
            }
            None => &self.channels,
        };

        let duration_minutes = overrides
            .duration_minutes
            .unwrap_or(self.system.duration_minutes);
        if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
            return Err(BudgetError::InvalidInput(format!(
                "duration must be a positive number of minutes, got {duration_minutes}"
            )));
        }

        let battery_wh = self.system.battery_capacity_wh * battery / 100.0;
        let battery_w = battery_wh / (duration_minutes / 60.0);
        let available_power_w = battery_w + power;

        debug!(
            battery_percent = battery,
            solar_w = power,
            duration_minutes,
            available_power_w,
            "power budget normalized"
        );

        Ok(NormalizedBudget {
            available_power_w,
            channels,
            duration_minutes,
        })
    }
}
