use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf};

use crate::budget::PowerBudget;
use crate::domain::{ChannelConfig, SystemConfig};

/// Default location of the configuration file, overridable with
/// `OFFGRID_CONFIG_FILE`.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub log: LogConfig,
    pub power: PowerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub db: DbConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub enable_cors: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Bearer token guarding the API. Empty disables authentication.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PowerConfig {
    pub battery_capacity_wh: f64,
    pub duration_minutes: f64,
    pub battery_protection_threshold: f64,
    pub channels: ChannelConfig,
}

impl PowerConfig {
    pub fn system(&self) -> SystemConfig {
        SystemConfig {
            battery_capacity_wh: self.battery_capacity_wh,
            duration_minutes: self.duration_minutes,
            battery_protection_threshold: self.battery_protection_threshold,
        }
    }

    pub fn budget(&self) -> PowerBudget {
        PowerBudget::new(self.system(), self.channels.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Endpoint of the relay board. Unset selects the simulated transport.
    pub url: Option<String>,
    #[serde(default = "default_relay_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub reset_on_startup: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_relay_timeout_secs(),
            reset_on_startup: true,
        }
    }
}

fn default_relay_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastConfig {
    /// Serialized generation model. Forecasts are unavailable when unset.
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Loads `.env`, the TOML file and `OFFGRID__`-prefixed environment
    /// variables, in increasing precedence.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("OFFGRID_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("OFFGRID__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.power;
        ensure!(!p.channels.is_empty(), "power.channels must define at least one channel");
        if let Err(e) = p.channels.check_draws() {
            anyhow::bail!("power.channels: {e}");
        }
        ensure!(
            p.battery_capacity_wh.is_finite() && p.battery_capacity_wh > 0.0,
            "power.battery_capacity_wh must be positive"
        );
        ensure!(
            p.duration_minutes.is_finite() && p.duration_minutes > 0.0,
            "power.duration_minutes must be positive"
        );
        ensure!(
            (0.0..=100.0).contains(&p.battery_protection_threshold),
            "power.battery_protection_threshold must be within 0-100"
        );
        ensure!(self.relay.timeout_secs > 0, "relay.timeout_secs must be positive");
        self.server.socket_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 5000

        [power]
        battery_capacity_wh = 100.0
        duration_minutes = 60
        battery_protection_threshold = 20

        [power.channels]
        A = 50
        B = 30
        C = 20
        D = 10
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.power.channels.len(), 4);
        assert_eq!(cfg.relay.timeout_secs, 5);
        assert!(cfg.relay.reset_on_startup);
        assert!(cfg.relay.url.is_none());
        assert!(cfg.auth.token.is_empty());
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.server.request_timeout_secs, 30);
        assert_eq!(cfg.server.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn budget_reflects_power_section() {
        let cfg = Config::from_toml_str(MINIMAL).unwrap();
        let budget = cfg.power.budget();
        assert_eq!(budget.system().battery_capacity_wh, 100.0);
        assert_eq!(budget.channels().draw("A"), Some(50.0));
    }

    #[test]
    fn empty_channel_table_is_rejected() {
        let toml = MINIMAL.replace("A = 50\n        B = 30\n        C = 20\n        D = 10", "");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn zero_duration_is_rejected() {
        let toml = MINIMAL.replace("duration_minutes = 60", "duration_minutes = 0");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn threshold_above_hundred_is_rejected() {
        let toml = MINIMAL.replace(
            "battery_protection_threshold = 20",
            "battery_protection_threshold = 120",
        );
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn negative_draw_is_rejected() {
        let toml = MINIMAL.replace("D = 10", "D = -10");
        assert!(Config::from_toml_str(&toml).is_err());
    }
}
