use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{ChannelConfig, ChannelId};

/// Switch position of one relay as stored by the relay store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn is_on(self) -> bool {
        matches!(self, RelayState::On)
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on {
            RelayState::On
        } else {
            RelayState::Off
        }
    }
}

impl std::str::FromStr for RelayState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(RelayState::On),
            "off" => Ok(RelayState::Off),
            _ => Err(format!("Unknown relay state: {}", s)),
        }
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayState::On => write!(f, "on"),
            RelayState::Off => write!(f, "off"),
        }
    }
}

/// On/off position of every channel, `true` meaning energized.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayStatus(BTreeMap<ChannelId, bool>);

impl RelayStatus {
    pub fn new(status: BTreeMap<ChannelId, bool>) -> Self {
        Self(status)
    }

    /// Every configured channel switched off.
    pub fn all_off(channels: &ChannelConfig) -> Self {
        Self(channels.ids().map(|id| (id.clone(), false)).collect())
    }

    pub fn is_on(&self, id: &str) -> bool {
        self.0.get(id).copied().unwrap_or(false)
    }

    pub fn set(&mut self, id: ChannelId, on: bool) {
        self.0.insert(id, on);
    }

    /// Channels currently energized.
    pub fn active(&self) -> BTreeSet<ChannelId> {
        self.0
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Channels that are off in `self` and on in `next`.
    pub fn switched_on_in(&self, next: &RelayStatus) -> Vec<ChannelId> {
        next.0
            .iter()
            .filter(|(id, on)| **on && !self.is_on(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelId, bool)> {
        self.0.iter().map(|(id, on)| (id, *on))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ledger entry to append for an off→on transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub buyer_id: i64,
    /// Configured draw of the channel, watts.
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Stored trade ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    pub buyer_id: i64,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Trade history filter. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TradeQuery {
    pub user_id: Option<i64>,
    /// Inclusive lower bound, from midnight UTC.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on the calendar date.
    pub end_date: Option<NaiveDate>,
    /// Exact calendar date.
    pub date: Option<NaiveDate>,
}

impl TradeQuery {
    pub fn matches(&self, trade: &TradeRecord) -> bool {
        let day = trade.timestamp.date_naive();
        self.user_id.map_or(true, |id| trade.buyer_id == id)
            && self.start_date.map_or(true, |d| day >= d)
            && self.end_date.map_or(true, |d| day <= d)
            && self.date.map_or(true, |d| day == d)
    }
}
