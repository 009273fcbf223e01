// Pairing: Connection Pairing Monitor
//
// Lifecycle of one pairing screen:
//   Idle → Fetching → AwaitingScan ⇄ Checking → Connected (terminal)
//                  ↘ Error (pairing request failed; retry re-enters Fetching)
//
// Guarantees:
//   • At most one status check in flight (shared by timer ticks and manual checks)
//   • Effective checks are at least `min_check_interval` apart; throttled calls
//     return the cached value without touching the backend
//   • At most one poll timer; re-arming aborts the previous one
//   • The completion callback fires once, at the terminal transition
//   • After `close()` no response is applied and no callback fires

use super::api::PairingBackend;
use super::config::PairingConfig;
use super::events::{EventHub, PairingEvent};
use crate::atoms::constants::{DEFAULT_MIN_CHECK_INTERVAL_SECS, DEFAULT_POLL_INTERVAL_SECS};
use crate::atoms::error::{PairingError, PairingResult};
use crate::atoms::types::{LinkStatus, PairingOutcome, PairingPhase, PairingSession};
use crate::engine::session::AppSession;
use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

type ConnectedCallback = Box<dyn FnOnce(&PairingSession) + Send + 'static>;

// ── Policy ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub poll_interval: Duration,
    /// Throttle floor applied to every check path.
    pub min_check_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            min_check_interval: Duration::from_secs(DEFAULT_MIN_CHECK_INTERVAL_SECS),
        }
    }
}

impl From<&PairingConfig> for PollPolicy {
    fn from(config: &PairingConfig) -> Self {
        PollPolicy {
            poll_interval: config.poll_interval(),
            min_check_interval: config.min_check_interval(),
        }
    }
}

/// Point-in-time view of a monitor, for rendering.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub phase: PairingPhase,
    pub session: Option<PairingSession>,
    pub check_in_flight: bool,
    pub alive: bool,
}

// ── State ──────────────────────────────────────────────────────────────

struct MonitorState {
    phase: PairingPhase,
    session: Option<PairingSession>,
    /// Cached answer returned by throttled checks.
    last_known: bool,
    last_polled_at: Option<Instant>,
    checking: bool,
    timer: Option<JoinHandle<()>>,
    on_connected: Option<ConnectedCallback>,
}

struct MonitorInner {
    id: String,
    backend: Arc<dyn PairingBackend>,
    session: AppSession,
    policy: PollPolicy,
    alive: AtomicBool,
    /// Bumped on teardown; in-flight work compares against its captured value.
    generation: AtomicU64,
    state: Mutex<MonitorState>,
    events: EventHub,
}

impl MonitorInner {
    fn is_current(&self, generation: u64) -> bool {
        self.alive.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}

/// Releases the in-flight flag even when the check future is dropped mid-call.
struct CheckGuard<'a> {
    inner: &'a MonitorInner,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.inner.state.lock();
        st.checking = false;
        if st.phase == PairingPhase::Checking {
            st.phase = PairingPhase::AwaitingScan;
        }
    }
}

/// Puts the phase back if a pairing request future is dropped before it resolves.
struct FetchGuard<'a> {
    inner: &'a MonitorInner,
    restore: PairingPhase,
    armed: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut st = self.inner.state.lock();
        if st.phase == PairingPhase::Fetching {
            st.phase = self.restore;
        }
    }
}

// ── Monitor ────────────────────────────────────────────────────────────

/// Handle to one pairing session. Clones share the same state.
///
/// Timers are spawned on the ambient tokio runtime, so `start_polling` must be
/// called from within one.
#[derive(Clone)]
pub struct PairingMonitor {
    inner: Arc<MonitorInner>,
}

impl PairingMonitor {
    pub fn new(backend: Arc<dyn PairingBackend>, session: AppSession, policy: PollPolicy) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        info!(
            "[pairing] Monitor {} opened (poll {}s, throttle {}s)",
            id,
            policy.poll_interval.as_secs(),
            policy.min_check_interval.as_secs()
        );
        PairingMonitor {
            inner: Arc::new(MonitorInner {
                id,
                backend,
                session,
                policy,
                alive: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                state: Mutex::new(MonitorState {
                    phase: PairingPhase::Idle,
                    session: None,
                    last_known: false,
                    last_polled_at: None,
                    checking: false,
                    timer: None,
                    on_connected: None,
                }),
                events: EventHub::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PairingEvent> {
        self.inner.events.subscribe()
    }

    pub fn app_session(&self) -> &AppSession {
        &self.inner.session
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> PairingPhase {
        self.inner.state.lock().phase
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let st = self.inner.state.lock();
        MonitorSnapshot {
            phase: st.phase,
            session: st.session.clone(),
            check_in_flight: st.checking,
            alive: self.is_alive(),
        }
    }

    // ── Pairing code ───────────────────────────────────────────────────

    /// Ask the backend for a pairing code. Does not start polling.
    ///
    /// Also the retry path after a failed request, and the refresh path while
    /// a code is displayed.
    pub async fn request_pairing_code(&self) -> PairingResult<PairingOutcome> {
        let inner = &*self.inner;
        let (credential, generation, restore) = {
            let mut st = inner.state.lock();
            if !self.is_alive() {
                return Err(PairingError::Closed);
            }
            match st.phase {
                PairingPhase::Connected => {
                    return Ok(PairingOutcome::AlreadyConnected {
                        instance_key: st.session.as_ref().map(|s| s.instance_key.clone()),
                    });
                }
                PairingPhase::Fetching => return Err(PairingError::RequestInFlight),
                _ => {}
            }
            let credential = inner.session.credential().ok_or_else(|| {
                warn!("[pairing] Monitor {}: no credential, cannot request a pairing code", inner.id);
                PairingError::CredentialMissing
            })?;
            let restore = match st.phase {
                PairingPhase::Checking => PairingPhase::AwaitingScan,
                other => other,
            };
            st.phase = PairingPhase::Fetching;
            (credential, inner.generation.load(Ordering::Acquire), restore)
        };

        let mut guard = FetchGuard { inner, restore, armed: true };
        inner.events.emit(PairingEvent::Connecting { at: Utc::now() });
        info!("[pairing] Monitor {}: requesting pairing code", inner.id);

        let result = inner.backend.connect(&credential).await;

        let mut st = inner.state.lock();
        guard.armed = false;
        if !inner.is_current(generation) {
            info!("[pairing] Monitor {}: closed during request, discarding reply", inner.id);
            return Err(PairingError::Closed);
        }
        if st.phase.is_terminal() {
            // A status check observed the link while this refresh was in flight.
            return Ok(PairingOutcome::AlreadyConnected {
                instance_key: st.session.as_ref().map(|s| s.instance_key.clone()),
            });
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail_request(&mut st, into_request_failure(e))),
        };

        if reply.connected {
            let pending = self.finish_connected(&mut st, reply.instance_key.clone());
            drop(st);
            info!("[pairing] Monitor {}: account already linked", inner.id);
            inner.events.emit(PairingEvent::AlreadyConnected {
                instance_key: reply.instance_key.clone(),
                at: Utc::now(),
            });
            fire(pending);
            return Ok(PairingOutcome::AlreadyConnected { instance_key: reply.instance_key });
        }

        let Some(image) = reply.pairing_image else {
            let err = PairingError::request_failed(200, "reply carried no pairing image");
            return Err(self.fail_request(&mut st, err));
        };

        let instance_key = reply.instance_key.unwrap_or_default();
        let mut session = PairingSession::awaiting_scan(image.clone(), instance_key.clone());
        session.polling_active = st.timer.is_some();
        session.last_polled_at = st.last_polled_at;
        st.session = Some(session.clone());
        st.phase = PairingPhase::AwaitingScan;
        drop(st);

        info!("[pairing] Monitor {}: pairing code ready for instance '{}'", inner.id, instance_key);
        inner.events.emit(PairingEvent::QrCode { qr: image, instance_key, at: Utc::now() });
        Ok(PairingOutcome::AwaitingScan(session))
    }

    fn fail_request(&self, st: &mut MonitorState, err: PairingError) -> PairingError {
        warn!("[pairing] Monitor {}: pairing request failed: {}", self.inner.id, err);
        st.phase = PairingPhase::Error;
        st.session = None;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
        self.inner.events.emit(PairingEvent::Error {
            message: err.to_string(),
            retryable: err.is_retryable(),
            at: Utc::now(),
        });
        err
    }

    // ── Status check ───────────────────────────────────────────────────

    /// One point-in-time link check. Throttled, mutually exclusive, and never
    /// errors: failures read as "not connected yet".
    pub async fn check_status(&self) -> bool {
        let inner = &*self.inner;
        let (credential, generation) = {
            let mut st = inner.state.lock();
            if !self.is_alive() {
                return st.last_known;
            }
            if st.phase.is_terminal() {
                return true;
            }
            if st.checking {
                debug!("[pairing] Monitor {}: check already in flight", inner.id);
                return false;
            }
            let now = Instant::now();
            if let Some(last) = st.last_polled_at {
                if now.duration_since(last) < inner.policy.min_check_interval {
                    debug!("[pairing] Monitor {}: check throttled", inner.id);
                    return st.last_known;
                }
            }
            let Some(credential) = inner.session.credential() else {
                warn!("[pairing] Monitor {}: no credential, skipping status check", inner.id);
                return false;
            };
            st.checking = true;
            st.last_polled_at = Some(now);
            if let Some(session) = st.session.as_mut() {
                session.last_polled_at = Some(now);
            }
            if st.phase == PairingPhase::AwaitingScan {
                st.phase = PairingPhase::Checking;
            }
            (credential, inner.generation.load(Ordering::Acquire))
        };

        let _guard = CheckGuard { inner };
        let result = inner.backend.status(&credential).await;

        let pending = {
            let mut st = inner.state.lock();
            if !inner.is_current(generation) {
                debug!("[pairing] Monitor {}: closed during check, discarding reply", inner.id);
                return false;
            }
            match result {
                Ok(LinkStatus::Connected) => {
                    let key = st.session.as_ref().map(|s| s.instance_key.clone());
                    self.finish_connected(&mut st, key)
                }
                Ok(LinkStatus::Pending(state)) => {
                    debug!("[pairing] Monitor {}: not linked yet ({})", inner.id, state);
                    return false;
                }
                Err(e) => {
                    warn!("[pairing] Monitor {}: status check failed: {}", inner.id, e);
                    return false;
                }
            }
        };

        let instance_key = pending.as_ref().map(|(_, s)| s.instance_key.clone()).unwrap_or_default();
        info!("[pairing] Monitor {}: WhatsApp connected", inner.id);
        inner.events.emit(PairingEvent::Connected { instance_key, at: Utc::now() });
        fire(pending);
        true
    }

    /// Terminal transition. Returns the callback (if any) to run once the lock is released.
    fn finish_connected(
        &self,
        st: &mut MonitorState,
        instance_key: Option<String>,
    ) -> Option<(ConnectedCallback, PairingSession)> {
        st.phase = PairingPhase::Connected;
        st.last_known = true;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }

        let key = instance_key.unwrap_or_default();
        let last_polled_at = st.last_polled_at;
        let session = st
            .session
            .get_or_insert_with(|| PairingSession {
                connected: true,
                pairing_image: None,
                instance_key: key.clone(),
                last_polled_at,
                polling_active: false,
            });
        session.connected = true;
        session.pairing_image = None;
        session.polling_active = false;
        if session.instance_key.is_empty() {
            session.instance_key = key;
        }
        let snapshot = session.clone();

        let published_key = Some(snapshot.instance_key.clone()).filter(|k| !k.is_empty());
        self.inner.session.publish_connected(published_key);

        st.on_connected.take().map(|cb| (cb, snapshot))
    }

    // ── Polling ────────────────────────────────────────────────────────

    /// Arm the recurring check. Any previous timer is aborted first.
    /// `on_connected` runs exactly once, when the link is observed.
    ///
    /// Returns `false` (and arms nothing) unless a code is awaiting a scan.
    pub fn start_polling<F>(&self, on_connected: F) -> bool
    where
        F: FnOnce(&PairingSession) + Send + 'static,
    {
        let mut st = self.inner.state.lock();
        if !self.is_alive() || !matches!(st.phase, PairingPhase::AwaitingScan | PairingPhase::Checking) {
            debug!("[pairing] Monitor {}: not awaiting a scan, polling not started", self.inner.id);
            return false;
        }
        if let Some(old) = st.timer.take() {
            debug!("[pairing] Monitor {}: replacing existing poll timer", self.inner.id);
            old.abort();
        }
        st.on_connected = Some(Box::new(on_connected));
        st.timer = Some(tokio::spawn(poll_loop(Arc::downgrade(&self.inner), self.inner.policy.poll_interval)));
        if let Some(session) = st.session.as_mut() {
            session.polling_active = true;
        }
        info!(
            "[pairing] Monitor {}: polling every {}s",
            self.inner.id,
            self.inner.policy.poll_interval.as_secs()
        );
        true
    }

    /// Idempotent. Keeps the completion callback for a later manual check.
    pub fn stop_polling(&self) {
        let mut st = self.inner.state.lock();
        if let Some(timer) = st.timer.take() {
            timer.abort();
            info!("[pairing] Monitor {}: polling stopped", self.inner.id);
        }
        if let Some(session) = st.session.as_mut() {
            session.polling_active = false;
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner.state.lock().timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    // ── Teardown ───────────────────────────────────────────────────────

    /// Close the pairing screen: abort timers, discard state, ignore late replies.
    pub fn close(&self) {
        if !self.inner.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        {
            let mut st = self.inner.state.lock();
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
            st.on_connected = None;
            st.session = None;
            st.phase = PairingPhase::Idle;
        }
        info!("[pairing] Monitor {} closed", self.inner.id);
        self.inner.events.emit(PairingEvent::Closed { at: Utc::now() });
    }
}

fn fire(pending: Option<(ConnectedCallback, PairingSession)>) {
    if let Some((callback, session)) = pending {
        callback(&session);
    }
}

/// Everything that goes wrong minting a code surfaces as a request failure.
fn into_request_failure(err: PairingError) -> PairingError {
    match err {
        PairingError::PairingRequestFailed { .. } | PairingError::CredentialMissing => err,
        PairingError::Network(e) => {
            let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
            PairingError::request_failed(status, e.to_string())
        }
        other => PairingError::request_failed(0, other.to_string()),
    }
}

async fn poll_loop(monitor: Weak<MonitorInner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = monitor.upgrade() else { break };
        if !inner.alive.load(Ordering::Acquire) {
            break;
        }
        if (PairingMonitor { inner }).check_status().await {
            break;
        }
    }
}
