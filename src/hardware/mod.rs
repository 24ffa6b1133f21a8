//! Relay hardware access. The controller only talks to a [`RelayTransport`];
//! which one is used depends on whether a relay board URL is configured.

pub mod relay;

pub use relay::{HttpRelayTransport, SimulatedRelayTransport};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RelayConfig;
use crate::domain::RelayStatus;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Relay transport not configured")]
    NotConfigured,
    #[error("Relay board timed out")]
    Timeout,
    #[error("Relay board unreachable: {0}")]
    Connect(String),
    #[error("Relay board answered HTTP {0}")]
    Status(u16),
    #[error("Relay transport error: {0}")]
    Other(String),
}

/// Pushes a full relay map to the switching hardware.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, status: &RelayStatus) -> Result<(), TransportError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    /// No board attached, switching is only recorded
    Simulated,
    /// Relay board reachable over HTTP
    Http,
}

impl HardwareMode {
    pub fn for_config(cfg: &RelayConfig) -> Self {
        match cfg.url.as_deref() {
            Some(url) if !url.trim().is_empty() => HardwareMode::Http,
            _ => HardwareMode::Simulated,
        }
    }
}

/// Builds the transport for the configured relay board.
pub fn transport_for(cfg: &RelayConfig) -> anyhow::Result<Arc<dyn RelayTransport>> {
    match (HardwareMode::for_config(cfg), cfg.url.as_deref()) {
        (HardwareMode::Http, Some(url)) => {
            tracing::info!(url, "using HTTP relay board");
            Ok(Arc::new(HttpRelayTransport::new(
                url.to_string(),
                std::time::Duration::from_secs(cfg.timeout_secs),
            )?))
        }
        _ => {
            tracing::warn!("no relay board configured, relay switching is simulated");
            Ok(Arc::new(SimulatedRelayTransport::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_url_selects_simulator() {
        let mut cfg = RelayConfig::default();
        assert_eq!(HardwareMode::for_config(&cfg), HardwareMode::Simulated);
        cfg.url = Some("  ".into());
        assert_eq!(HardwareMode::for_config(&cfg), HardwareMode::Simulated);
        cfg.url = Some("http://10.0.0.7".into());
        assert_eq!(HardwareMode::for_config(&cfg), HardwareMode::Http);
    }

    #[test]
    fn factory_names_transport() {
        let cfg = RelayConfig::default();
        assert_eq!(transport_for(&cfg).unwrap().name(), "simulated");
    }
}
