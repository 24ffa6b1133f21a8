//! Live updates pushed to WebSocket subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::{RelayStatus, SensorReading};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    SensorReading(SensorReading),
    RelayStatus(RelayStatus),
}

#[derive(Clone)]
pub struct LiveEvents {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fan out to current subscribers. Having none is not an error.
    pub fn publish(&self, event: LiveEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::trace!(receivers, "live event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl Default for LiveEvents {
    fn default() -> Self {
        Self::new()
    }
}
