use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{RelayStore, RepoError, SensorStore, TradeLedger};
use crate::domain::{
    ChannelConfig, ChannelId, NewTrade, RelayStatus, SensorReading, TradeQuery, TradeRecord,
};

/// Process-local store used by the simulator build and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<SensorReading>>,
    relays: RwLock<BTreeMap<ChannelId, bool>>,
    trades: RwLock<Vec<TradeRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger entries, for assertions.
    pub async fn trade_count(&self) -> usize {
        self.trades.read().await.len()
    }
}

#[async_trait]
impl SensorStore for MemoryStore {
    async fn insert(&self, reading: &SensorReading) -> Result<(), RepoError> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<SensorReading>, RepoError> {
        let readings = self.readings.read().await;
        Ok(readings.iter().max_by_key(|r| r.timestamp).cloned())
    }

    async fn solar_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<f64>, RepoError> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .filter(|r| r.timestamp <= at)
            .max_by_key(|r| r.timestamp)
            .map(|r| r.solar_w))
    }

    async fn hourly_mean_solar(&self, date: NaiveDate, hour: u32) -> Result<Option<f64>, RepoError> {
        let start = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| RepoError::Query(format!("invalid hour {hour}")))?
            .and_utc();
        let end = start + Duration::hours(1);

        let readings = self.readings.read().await;
        let in_hour: Vec<f64> = readings
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .map(|r| r.solar_w)
            .collect();
        if in_hour.is_empty() {
            return Ok(None);
        }
        Ok(Some(in_hour.iter().sum::<f64>() / in_hour.len() as f64))
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn status(&self, channels: &ChannelConfig) -> Result<RelayStatus, RepoError> {
        let relays = self.relays.read().await;
        Ok(RelayStatus::new(
            channels
                .ids()
                .map(|id| (id.clone(), relays.get(id).copied().unwrap_or(false)))
                .collect(),
        ))
    }

    async fn commit(&self, status: &RelayStatus, trades: &[NewTrade]) -> Result<(), RepoError> {
        // Both locks are held for the whole update so readers never observe a
        // status without its trades.
        let mut relays = self.relays.write().await;
        let mut ledger = self.trades.write().await;

        for (id, on) in status.iter() {
            relays.insert(id.clone(), on);
        }
        let next_id = ledger.len() as i64 + 1;
        ledger.extend(trades.iter().enumerate().map(|(i, t)| TradeRecord {
            id: next_id + i as i64,
            buyer_id: t.buyer_id,
            amount: t.amount,
            timestamp: t.timestamp,
        }));
        Ok(())
    }
}

#[async_trait]
impl TradeLedger for MemoryStore {
    async fn history(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>, RepoError> {
        let ledger = self.trades.read().await;
        let mut out: Vec<TradeRecord> = ledger.iter().filter(|t| query.matches(t)).cloned().collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn latest_and_lookback_follow_timestamps() {
        let store = MemoryStore::new();
        store.insert(&SensorReading::new(80.0, 120.0, 900.0, at(10, 0))).await.unwrap();
        store.insert(&SensorReading::new(78.0, 90.0, 700.0, at(11, 30))).await.unwrap();
        store.insert(&SensorReading::new(79.0, 100.0, 800.0, at(11, 0))).await.unwrap();

        assert_eq!(store.latest().await.unwrap().unwrap().timestamp, at(11, 30));
        assert_eq!(store.solar_at_or_before(at(10, 30)).await.unwrap(), Some(120.0));
        assert_eq!(store.solar_at_or_before(at(9, 0)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn hourly_mean_covers_half_open_hour() {
        let store = MemoryStore::new();
        store.insert(&SensorReading::new(50.0, 100.0, 0.0, at(9, 0))).await.unwrap();
        store.insert(&SensorReading::new(50.0, 200.0, 0.0, at(9, 59))).await.unwrap();
        store.insert(&SensorReading::new(50.0, 999.0, 0.0, at(10, 0))).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(store.hourly_mean_solar(day, 9).await.unwrap(), Some(150.0));
        assert_eq!(store.hourly_mean_solar(day, 8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unseen_channels_read_as_off() {
        let store = MemoryStore::new();
        let channels = ChannelConfig::new([("A", 50.0), ("B", 30.0)]);
        let status = store.status(&channels).await.unwrap();
        assert_eq!(status.len(), 2);
        assert!(status.active().is_empty());
    }

    #[tokio::test]
    async fn commit_writes_status_and_trades_together() {
        let store = MemoryStore::new();
        let channels = ChannelConfig::new([("A", 50.0), ("B", 30.0)]);
        let mut status = RelayStatus::all_off(&channels);
        status.set("B".into(), true);
        let trade = NewTrade {
            buyer_id: 2,
            amount: 30.0,
            timestamp: at(12, 0),
        };

        store.commit(&status, &[trade]).await.unwrap();

        assert!(store.status(&channels).await.unwrap().is_on("B"));
        let history = store.history(&TradeQuery::default()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].buyer_id, 2);
        assert_eq!(history[0].amount, 30.0);
    }
}
