use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::debug;

use super::{BudgetError, BudgetOverrides, PowerBudget};
use crate::domain::{ChannelConfig, ChannelId};

/// A set of channels to energize together and their combined draw.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChannelSelection {
    pub channels: Vec<ChannelId>,
    pub total_power_w: f64,
}

impl ChannelSelection {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Ordering key: more channels first, then more power.
    pub fn rank(&self) -> (usize, OrderedFloat<f64>) {
        (self.channels.len(), OrderedFloat(self.total_power_w))
    }
}

impl PowerBudget {
    /// Picks the admissible channel subset with the most channels, breaking
    /// ties on total power. Returns an empty selection when nothing fits.
    pub fn optimal_combination(
        &self,
        battery: f64,
        power: f64,
        overrides: &BudgetOverrides,
    ) -> Result<ChannelSelection, BudgetError> {
        let budget = self.normalize(battery, power, overrides)?;
        let best = select_optimal(budget.channels, budget.available_power_w);

        if best.is_empty() {
            debug!(available_power_w = budget.available_power_w, "no admissible channel combination");
        } else {
            debug!(
                channels = ?best.channels,
                total_power_w = best.total_power_w,
                "optimal channel combination selected"
            );
        }
        Ok(best)
    }
}

/// Every non-empty subset of `channels`, smallest first, each size in
/// lexicographic channel order.
pub fn combinations(channels: &ChannelConfig) -> impl Iterator<Item = ChannelSelection> + '_ {
    let entries: Vec<(&ChannelId, f64)> = channels.iter().collect();
    (1..=entries.len()).flat_map(move |size| {
        entries
            .clone()
            .into_iter()
            .combinations(size)
            .map(|combo| ChannelSelection {
                total_power_w: combo.iter().map(|(_, w)| w).sum(),
                channels: combo.into_iter().map(|(id, _)| id.clone()).collect(),
            })
    })
}

/// Exhaustive search over [`combinations`]. The first maximal subset in
/// enumeration order wins a tie.
pub fn select_optimal(channels: &ChannelConfig, available_power_w: f64) -> ChannelSelection {
    combinations(channels)
        .filter(|c| c.total_power_w <= available_power_w)
        .fold(None::<ChannelSelection>, |best, candidate| match best {
            Some(best) if best.rank() >= candidate.rank() => Some(best),
            _ => Some(candidate),
        })
        .unwrap_or_default()
}
