use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{RelayTransport, TransportError};
use crate::domain::RelayStatus;

/// Relay board driven by a JSON POST of the full relay map,
/// e.g. `{"A": true, "B": false}`.
#[derive(Clone)]
pub struct HttpRelayTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpRelayTransport {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("offgrid-controller/0.1"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { url, client })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send(&self, status: &RelayStatus) -> Result<(), TransportError> {
        let resp = self.client.post(&self.url).json(status).send().await?;
        let code = resp.status();
        if !code.is_success() {
            tracing::warn!(status = %code, url = %self.url, "relay board rejected command");
            return Err(TransportError::Status(code.as_u16()));
        }
        tracing::debug!(channels = status.len(), "relay command delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Stand-in used when no board is attached. Remembers the last map sent.
#[derive(Debug, Default)]
pub struct SimulatedRelayTransport {
    last: RwLock<Option<RelayStatus>>,
}

impl SimulatedRelayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last_sent(&self) -> Option<RelayStatus> {
        self.last.read().await.clone()
    }
}

#[async_trait]
impl RelayTransport for SimulatedRelayTransport {
    async fn send(&self, status: &RelayStatus) -> Result<(), TransportError> {
        tracing::debug!(active = ?status.active(), "simulated relay switch");
        *self.last.write().await = Some(status.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
