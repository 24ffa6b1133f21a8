#![cfg(feature = "db")]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{mysql::MySqlPoolOptions, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};

use super::{RelayStore, RepoError, SensorStore, TradeLedger};
use crate::config::DbConfig;
use crate::domain::{
    ChannelConfig, NewTrade, RelayState, RelayStatus, SensorReading, TradeQuery, TradeRecord,
};

pub struct MySqlRepo {
    pub pool: MySqlPool,
}

impl MySqlRepo {
    pub async fn connect(cfg: &DbConfig) -> anyhow::Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections = cfg.max_connections, "connected to MySQL");
        Ok(Self { pool })
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                RepoError::Unavailable(error.to_string())
            }
            _ => RepoError::Query(error.to_string()),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SensorRow {
    soc: f64,
    solar_w: f64,
    lux: f64,
    timestamp: DateTime<Utc>,
}

impl From<SensorRow> for SensorReading {
    fn from(row: SensorRow) -> Self {
        SensorReading::new(row.soc, row.solar_w, row.lux, row.timestamp)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    id: i64,
    buyer_id: i64,
    amount: f64,
    timestamp: DateTime<Utc>,
}

#[async_trait]
impl SensorStore for MySqlRepo {
    async fn insert(&self, reading: &SensorReading) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO sun_data (soc, solar_w, lux, timestamp) VALUES (?, ?, ?, ?)")
            .bind(reading.soc)
            .bind(reading.solar_w)
            .bind(reading.lux)
            .bind(reading.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<SensorReading>, RepoError> {
        let row = sqlx::query_as::<_, SensorRow>(
            "SELECT soc, solar_w, lux, timestamp FROM sun_data ORDER BY timestamp DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SensorReading::from))
    }

    async fn solar_at_or_before(&self, at: DateTime<Utc>) -> Result<Option<f64>, RepoError> {
        let solar = sqlx::query_scalar::<_, f64>(
            "SELECT solar_w FROM sun_data WHERE timestamp <= ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(solar)
    }

    async fn hourly_mean_solar(&self, date: NaiveDate, hour: u32) -> Result<Option<f64>, RepoError> {
        let start = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| RepoError::Query(format!("invalid hour {hour}")))?
            .and_utc();
        let mean = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(solar_w) FROM sun_data WHERE timestamp >= ? AND timestamp < ?",
        )
        .bind(start)
        .bind(start + Duration::hours(1))
        .fetch_one(&self.pool)
        .await?;
        Ok(mean)
    }
}

#[async_trait]
impl RelayStore for MySqlRepo {
    async fn status(&self, channels: &ChannelConfig) -> Result<RelayStatus, RepoError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT relay_name, status FROM relay_status")
            .fetch_all(&self.pool)
            .await?;

        let mut status = RelayStatus::all_off(channels);
        for (name, state) in rows {
            if !channels.contains(&name) {
                continue;
            }
            let state: RelayState = state.parse().map_err(RepoError::Corrupt)?;
            status.set(name.as_str().into(), state.is_on());
        }
        Ok(status)
    }

    async fn commit(&self, status: &RelayStatus, trades: &[NewTrade]) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        for (id, on) in status.iter() {
            sqlx::query(
                "INSERT INTO relay_status (relay_name, status) VALUES (?, ?) \
                 ON DUPLICATE KEY UPDATE status = VALUES(status)",
            )
            .bind(id.as_str())
            .bind(RelayState::from(on).to_string())
            .execute(&mut *tx)
            .await?;
        }

        for trade in trades {
            sqlx::query("INSERT INTO trade_history (buyer_id, amount, timestamp) VALUES (?, ?, ?)")
                .bind(trade.buyer_id)
                .bind(trade.amount)
                .bind(trade.timestamp)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(channels = status.len(), trades = trades.len(), "relay status committed");
        Ok(())
    }
}

#[async_trait]
impl TradeLedger for MySqlRepo {
    async fn history(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>, RepoError> {
        let mut qb: QueryBuilder<MySql> =
            QueryBuilder::new("SELECT id, buyer_id, amount, timestamp FROM trade_history WHERE 1=1");
        if let Some(user_id) = query.user_id {
            qb.push(" AND buyer_id = ").push_bind(user_id);
        }
        if let Some(start) = query.start_date {
            qb.push(" AND DATE(timestamp) >= ").push_bind(start);
        }
        if let Some(end) = query.end_date {
            qb.push(" AND DATE(timestamp) <= ").push_bind(end);
        }
        if let Some(date) = query.date {
            qb.push(" AND DATE(timestamp) = ").push_bind(date);
        }
        qb.push(" ORDER BY timestamp DESC, id DESC");

        let rows = qb.build_query_as::<TradeRow>().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| TradeRecord {
                id: r.id,
                buyer_id: r.buyer_id,
                amount: r.amount,
                timestamp: r.timestamp,
            })
            .collect())
    }
}
