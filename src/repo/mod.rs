//! Persistence for sensor readings, relay status and the trade ledger.
//!
//! Stores are trait objects so the service can run against MySQL (`db`
//! feature) or fully in memory.

pub mod memory;
#[cfg(feature = "db")]
pub mod mysql;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::domain::{ChannelConfig, NewTrade, RelayStatus, SensorReading, TradeQuery, TradeRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorStore: Send + Sync {
    async fn insert(&self, reading: &SensorReading) -> Result<(), RepoError>;
    async fn latest(&self) -> Result<Option<SensorReading>, RepoError>;
    /// Solar output of the newest reading taken at or before `at`.
    async fn solar_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<f64>, RepoError>;
    /// Mean solar output of the readings within one UTC hour.
    async fn hourly_mean_solar(&self, date: NaiveDate, hour: u32) -> Result<Option<f64>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayStore: Send + Sync {
    /// Status of every configured channel. Channels never written read as off.
    async fn status(&self, channels: &ChannelConfig) -> Result<RelayStatus, RepoError>;
    /// Writes the full status and appends `trades` as one all-or-nothing unit.
    async fn commit(&self, status: &RelayStatus, trades: &[NewTrade]) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeLedger: Send + Sync {
    /// Matching trades, newest first.
    async fn history(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>, RepoError>;
}

#[derive(Clone)]
pub struct Repositories {
    pub sensors: Arc<dyn SensorStore>,
    pub relays: Arc<dyn RelayStore>,
    pub trades: Arc<dyn TradeLedger>,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> anyhow::Result<Self> {
        #[cfg(feature = "db")]
        {
            let repo = Arc::new(mysql::MySqlRepo::connect(&cfg.db).await?);
            return Ok(Self {
                sensors: repo.clone(),
                relays: repo.clone(),
                trades: repo,
            });
        }

        #[cfg(not(feature = "db"))]
        {
            let _ = cfg;
            tracing::warn!("built without the db feature, using in-memory store");
            return Ok(Self::in_memory());
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::default()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            sensors: store.clone(),
            relays: store.clone(),
            trades: store,
        }
    }
}
