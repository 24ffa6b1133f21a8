//! Service layer between the HTTP API and the budgeting core.
//!
//! [`ChannelController`] reads the latest sensor snapshot and relay state from
//! the stores, runs the pure budget computations, and drives relay switching
//! (hardware first, then one atomic status + trade commit).

use anyhow::Result;
use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::budget::{AvailabilityMap, BudgetError, BudgetOverrides, ChannelSelection, PowerBudget};
use crate::config::Config;
use crate::domain::{ChannelId, NewTrade, RelayStatus, SensorReading, TradeQuery, TradeRecord};
use crate::events::{LiveEvent, LiveEvents};
use crate::forecast::{ForecastError, GenerationFeatures, GenerationForecast, GenerationPredictor};
use crate::hardware::{RelayTransport, TransportError};
use crate::repo::{RepoError, Repositories};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error("No sensor data available")]
    NoSensorData,
    #[error("Not enough history to forecast: missing {0}")]
    InsufficientHistory(&'static str),
    #[error("Invalid relay command: {0}")]
    InvalidCommand(String),
    #[error(transparent)]
    Store(#[from] RepoError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<ChannelController>,
    pub events: LiveEvents,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let repos = Repositories::new(&cfg).await?;
        let transport = crate::hardware::transport_for(&cfg.relay)?;
        let predictor = crate::forecast::load_predictor(&cfg.forecast);
        Ok(Self::from_parts(cfg, repos, transport, predictor))
    }

    /// Wires a state from already-built collaborators.
    pub fn from_parts(
        cfg: Config,
        repos: Repositories,
        transport: Arc<dyn RelayTransport>,
        predictor: Option<Arc<dyn GenerationPredictor>>,
    ) -> Self {
        let events = LiveEvents::new();
        let controller = Arc::new(ChannelController::new(
            Arc::new(cfg.power.budget()),
            repos,
            transport,
            predictor,
            events.clone(),
        ));
        Self {
            cfg,
            controller,
            events,
        }
    }
}

pub struct ChannelController {
    budget: Arc<PowerBudget>,
    repos: Repositories,
    transport: Arc<dyn RelayTransport>,
    predictor: Option<Arc<dyn GenerationPredictor>>,
    events: LiveEvents,
    /// Serializes relay writes so each command sees the status the previous
    /// one committed.
    control_lock: Mutex<()>,
}

impl ChannelController {
    pub fn new(
        budget: Arc<PowerBudget>,
        repos: Repositories,
        transport: Arc<dyn RelayTransport>,
        predictor: Option<Arc<dyn GenerationPredictor>>,
        events: LiveEvents,
    ) -> Self {
        Self {
            budget,
            repos,
            transport,
            predictor,
            events,
            control_lock: Mutex::new(()),
        }
    }

    pub fn budget(&self) -> &PowerBudget {
        &self.budget
    }

    /// Stores a reading stamped with the current time and announces it.
    pub async fn record_reading(
        &self,
        soc: f64,
        solar_w: f64,
        lux: f64,
    ) -> Result<SensorReading, ControlError> {
        let reading = SensorReading::new(soc, solar_w, lux, Utc::now());
        self.repos.sensors.insert(&reading).await?;
        self.events.publish(LiveEvent::SensorReading(reading.clone()));
        Ok(reading)
    }

    pub async fn latest_reading(&self) -> Result<SensorReading, ControlError> {
        self.repos
            .sensors
            .latest()
            .await?
            .ok_or(ControlError::NoSensorData)
    }

    /// Which channels could additionally be switched on given the latest
    /// reading and the relays currently on.
    pub async fn available_channels(
        &self,
        overrides: &BudgetOverrides,
        protection_threshold: Option<f64>,
    ) -> Result<AvailabilityMap, ControlError> {
        let reading = self.latest_reading().await?;
        let active = self
            .repos
            .relays
            .status(self.budget.channels())
            .await?
            .active();

        Ok(self.budget.availability(
            reading.soc,
            reading.solar_w,
            &active,
            overrides,
            protection_threshold,
        )?)
    }

    pub async fn optimal_combination(
        &self,
        overrides: &BudgetOverrides,
    ) -> Result<ChannelSelection, ControlError> {
        let reading = self.latest_reading().await?;
        Ok(self
            .budget
            .optimal_combination(reading.soc, reading.solar_w, overrides)?)
    }

    pub async fn relay_status(&self) -> Result<RelayStatus, ControlError> {
        Ok(self.repos.relays.status(self.budget.channels()).await?)
    }

    /// Switches every channel to the commanded position.
    ///
    /// The command must name exactly the configured channels. The map is
    /// pushed to the hardware first; only on success are the status and one
    /// trade per newly energized channel committed together. A failed commit
    /// pushes the previous map back to the hardware.
    pub async fn apply_relay_command(
        &self,
        command: BTreeMap<ChannelId, bool>,
    ) -> Result<RelayStatus, ControlError> {
        let channels = self.budget.channels();
        if let Some(unknown) = command.keys().find(|id| !channels.contains(id.as_str())) {
            return Err(ControlError::InvalidCommand(format!("unknown channel {unknown}")));
        }
        let missing: Vec<&str> = channels
            .ids()
            .filter(|id| !command.contains_key(*id))
            .map(ChannelId::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ControlError::InvalidCommand(format!(
                "missing channels {}",
                missing.join(", ")
            )));
        }

        let _guard = self.control_lock.lock().await;
        let current = self.repos.relays.status(channels).await?;
        let next = RelayStatus::new(command);

        let now = Utc::now();
        let trades: Vec<NewTrade> = current
            .switched_on_in(&next)
            .into_iter()
            .filter_map(|id| {
                let buyer_id = channels.position(id.as_str())? as i64;
                let amount = channels.draw(id.as_str())?;
                Some(NewTrade {
                    buyer_id,
                    amount,
                    timestamp: now,
                })
            })
            .collect();

        self.transport.send(&next).await?;

        if let Err(e) = self.repos.relays.commit(&next, &trades).await {
            error!(error = %e, "relay commit failed, restoring previous hardware state");
            if let Err(restore) = self.transport.send(&current).await {
                error!(error = %restore, "failed to restore relay hardware");
            }
            return Err(e.into());
        }

        info!(
            active = ?next.active(),
            trades = trades.len(),
            transport = self.transport.name(),
            "relay command applied"
        );
        self.events.publish(LiveEvent::RelayStatus(next.clone()));
        Ok(next)
    }

    /// Switches everything off without recording trades.
    pub async fn reset_relays(&self) -> Result<RelayStatus, ControlError> {
        let _guard = self.control_lock.lock().await;
        let off = RelayStatus::all_off(self.budget.channels());
        self.transport.send(&off).await?;
        self.repos.relays.commit(&off, &[]).await?;
        info!(transport = self.transport.name(), "all relays reset to off");
        self.events.publish(LiveEvent::RelayStatus(off.clone()));
        Ok(off)
    }

    pub async fn trade_history(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>, ControlError> {
        Ok(self.repos.trades.history(query).await?)
    }

    pub async fn forecast_generation(&self) -> Result<GenerationForecast, ControlError> {
        self.forecast_generation_at(Utc::now()).await
    }

    /// Forecast from the latest reading, the newest reading at least an hour
    /// old, and the mean output of the same hour yesterday.
    pub async fn forecast_generation_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<GenerationForecast, ControlError> {
        let predictor = self.predictor.as_ref().ok_or(ForecastError::ModelUnavailable)?;

        let latest = self
            .repos
            .sensors
            .latest()
            .await?
            .ok_or(ControlError::InsufficientHistory("latest reading"))?;
        let prev = self
            .repos
            .sensors
            .solar_at_or_before(now - Duration::hours(1))
            .await?
            .ok_or(ControlError::InsufficientHistory("reading from an hour ago"))?;
        let yesterday = self
            .repos
            .sensors
            .hourly_mean_solar((now - Duration::days(1)).date_naive(), now.hour())
            .await?
            .ok_or(ControlError::InsufficientHistory("yesterday's hourly mean"))?;

        let features = GenerationFeatures::from_parts(
            latest.timestamp,
            latest.solar_w,
            latest.lux,
            prev,
            yesterday,
        );
        let forecast = predictor.predict(&features).map_err(|e| {
            warn!(error = %e, "generation forecast failed");
            e
        })?;
        Ok(forecast)
    }
}
