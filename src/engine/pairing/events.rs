// Pairing: Status Events
// PairingEvent and the broadcast hub UIs subscribe to.

use crate::atoms::constants::EVENT_CHANNEL_CAPACITY;
use crate::atoms::types::PairingImage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Status updates for whatever renders the pairing screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairingEvent {
    Connecting { at: DateTime<Utc> },
    QrCode { qr: PairingImage, instance_key: String, at: DateTime<Utc> },
    AlreadyConnected { instance_key: Option<String>, at: DateTime<Utc> },
    Connected { instance_key: String, at: DateTime<Utc> },
    /// A pairing request failed; `retryable` drives the retry affordance.
    Error { message: String, retryable: bool, at: DateTime<Utc> },
    Closed { at: DateTime<Utc> },
}

impl PairingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PairingEvent::Connecting { .. } => "connecting",
            PairingEvent::QrCode { .. } => "qr_code",
            PairingEvent::AlreadyConnected { .. } => "already_connected",
            PairingEvent::Connected { .. } => "connected",
            PairingEvent::Error { .. } => "error",
            PairingEvent::Closed { .. } => "closed",
        }
    }
}

pub(crate) struct EventHub {
    tx: broadcast::Sender<PairingEvent>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventHub { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PairingEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget; having no listeners is normal.
    pub(crate) fn emit(&self, event: PairingEvent) {
        let _ = self.tx.send(event);
    }
}
