use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, collections::BTreeMap, fmt};

/// Identifier of a controllable downstream load (one relay), e.g. `"A"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Constant power draw (W) of every configured channel.
///
/// Iteration order is the channel id order, which is also the order used for
/// subset enumeration and buyer id assignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelConfig {
    draws: BTreeMap<ChannelId, f64>,
}

impl ChannelConfig {
    pub fn new<I, K>(draws: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<ChannelId>,
    {
        Self {
            draws: draws.into_iter().map(|(k, w)| (k.into(), w)).collect(),
        }
    }

    pub fn draw(&self, id: &str) -> Option<f64> {
        self.draws.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.draws.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ChannelId> {
        self.draws.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelId, f64)> {
        self.draws.iter().map(|(id, w)| (id, *w))
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// 1-based position of `id` in channel order. Used as the trade buyer id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.draws.keys().position(|k| k.as_str() == id).map(|i| i + 1)
    }

    /// Checks that every draw is a finite, non-negative wattage.
    pub fn check_draws(&self) -> Result<(), String> {
        for (id, w) in &self.draws {
            if !w.is_finite() || *w < 0.0 {
                return Err(format!("channel {id} has invalid draw {w} W"));
            }
        }
        Ok(())
    }
}

impl<K: Into<ChannelId>> FromIterator<(K, f64)> for ChannelConfig {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Installation-wide battery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub battery_capacity_wh: f64,
    /// Default sustain window over which stored energy is spread.
    pub duration_minutes: f64,
    /// SOC percent below which every channel is denied.
    pub battery_protection_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_iterate_in_id_order() {
        let cfg = ChannelConfig::new([("C", 20.0), ("A", 50.0), ("D", 10.0), ("B", 30.0)]);
        let ids: Vec<&str> = cfg.ids().map(ChannelId::as_str).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
        assert_eq!(cfg.position("A"), Some(1));
        assert_eq!(cfg.position("D"), Some(4));
        assert_eq!(cfg.position("E"), None);
    }

    #[test]
    fn negative_draw_is_rejected() {
        let cfg = ChannelConfig::new([("A", 50.0), ("B", -1.0)]);
        assert!(cfg.check_draws().is_err());
        let cfg = ChannelConfig::new([("A", f64::NAN)]);
        assert!(cfg.check_draws().is_err());
    }

    #[test]
    fn deserializes_from_table() {
        let cfg: ChannelConfig = toml::from_str("A = 50.0\nB = 30").unwrap();
        assert_eq!(cfg.draw("A"), Some(50.0));
        assert_eq!(cfg.draw("B"), Some(30.0));
        assert_eq!(cfg.len(), 2);
    }
}
