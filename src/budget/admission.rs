use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::{BudgetError, BudgetOverrides, PowerBudget};
use crate::domain::{ChannelConfig, ChannelId};

/// Whether each configured channel may additionally be switched on now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AvailabilityMap(BTreeMap<ChannelId, bool>);

impl AvailabilityMap {
    /// Every channel denied.
    pub fn none_available(channels: &ChannelConfig) -> Self {
        Self(channels.ids().map(|id| (id.clone(), false)).collect())
    }

    pub fn get(&self, id: &str) -> Option<bool> {
        self.0.get(id).copied()
    }

    pub fn available(&self) -> impl Iterator<Item = &ChannelId> {
        self.0.iter().filter(|(_, ok)| **ok).map(|(id, _)| id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<ChannelId, bool> {
        self.0
    }
}

impl PowerBudget {
    /// Per-channel admission for a system where `selected` channels are
    /// already on.
    ///
    /// Below the protection threshold every channel is denied. Otherwise a
    /// channel is admissible when it is not already selected and its draw
    /// fits in what the selected channels leave of the available power.
    pub fn availability(
        &self,
        battery: f64,
        power: f64,
        selected: &BTreeSet<ChannelId>,
        overrides: &BudgetOverrides,
        protection_threshold: Option<f64>,
    ) -> Result<AvailabilityMap, BudgetError> {
        let budget = self.normalize(battery, power, overrides)?;

        let threshold = protection_threshold.unwrap_or(self.system.battery_protection_threshold);
        if !(0.0..=100.0).contains(&threshold) {
            return Err(BudgetError::InvalidInput(format!(
                "protection threshold must be within 0-100 %, got {threshold}"
            )));
        }

        if battery < threshold {
            warn!(
                battery_percent = battery,
                threshold_percent = threshold,
                "battery below protection threshold, denying all channels"
            );
            return Ok(AvailabilityMap::none_available(budget.channels));
        }

        let selected_power = selected
            .iter()
            .map(|id| {
                budget.channels.draw(id.as_str()).ok_or_else(|| {
                    BudgetError::InvalidInput(format!("unknown channel {id} in selection"))
                })
            })
            .sum::<Result<f64, BudgetError>>()?;
        let remaining_power_w = budget.available_power_w - selected_power;

        let map = AvailabilityMap(
            budget
                .channels
                .iter()
                .map(|(id, draw)| {
                    let admissible = !selected.contains(id) && draw <= remaining_power_w;
                    (id.clone(), admissible)
                })
                .collect(),
        );

        debug!(
            selected = ?selected,
            selected_power_w = selected_power,
            remaining_power_w,
            available = ?map.available().collect::<Vec<_>>(),
            "channel availability computed"
        );
        Ok(map)
    }
}
