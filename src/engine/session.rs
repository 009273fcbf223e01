// engine/session.rs: Application-wide session state.
//
// Holds the bearer credential and the shared "is the account linked" flag.
// Readers subscribe through a watch channel; the flag is last-writer-wins.
// The pairing monitor publishes its connected transition through
// `publish_connected`; anything that re-queries the backend on its own uses
// `record_link_state`.

use crate::atoms::types::LinkState;
use chrono::Utc;
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

struct SessionInner {
    credential: RwLock<Option<String>>,
    link: watch::Sender<LinkState>,
}

/// Cheap-to-clone handle to the shared session.
#[derive(Clone)]
pub struct AppSession {
    inner: Arc<SessionInner>,
}

impl AppSession {
    pub fn new(credential: Option<String>) -> Self {
        let (link, _) = watch::channel(LinkState::default());
        AppSession {
            inner: Arc::new(SessionInner { credential: RwLock::new(credential), link }),
        }
    }

    // ── Credential ─────────────────────────────────────────────────────

    /// The bearer credential, if signed in. Blank tokens count as missing.
    pub fn credential(&self) -> Option<String> {
        self.inner.credential.read().clone().filter(|t| !t.trim().is_empty())
    }

    pub fn set_credential(&self, token: impl Into<String>) {
        *self.inner.credential.write() = Some(token.into());
    }

    /// Sign-out: drops the credential and resets the link flag.
    pub fn clear_credential(&self) {
        *self.inner.credential.write() = None;
        self.record_link_state(false, None);
        info!("[session] Credential cleared");
    }

    // ── Link state ─────────────────────────────────────────────────────

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.inner.link.subscribe()
    }

    pub fn link_state(&self) -> LinkState {
        self.inner.link.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.link.borrow().whatsapp_connected
    }

    /// Overwrite the link flag after an independent backend query.
    pub fn record_link_state(&self, connected: bool, instance_key: Option<String>) {
        self.inner.link.send_replace(LinkState {
            whatsapp_connected: connected,
            instance_key,
            updated_at: Utc::now(),
        });
    }

    /// The pairing monitor's unlinked → linked transition.
    pub(crate) fn publish_connected(&self, instance_key: Option<String>) {
        info!("[session] WhatsApp linked (instance {})", instance_key.as_deref().unwrap_or("-"));
        self.record_link_state(true, instance_key);
    }
}

impl Default for AppSession {
    fn default() -> Self {
        AppSession::new(None)
    }
}
