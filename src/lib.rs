// wabi-pairing: link a WhatsApp account to the Wabi backend by QR code.
//
// Layers:
//   atoms/ : constants, error taxonomy, value types (no I/O)
//   engine/: HTTP client, shared session state, pairing monitor

pub mod atoms;
pub mod engine;

pub use atoms::error::{PairingError, PairingResult};
pub use atoms::types::{
    ConnectReply, LinkState, LinkStatus, PairingImage, PairingOutcome, PairingPhase, PairingSession,
};
pub use engine::pairing::{
    HttpPairingBackend, MonitorSnapshot, PairingBackend, PairingConfig, PairingEvent, PairingMonitor, PollPolicy,
};
pub use engine::session::AppSession;

use std::path::Path;
use std::sync::Arc;

/// Load config (file, then env), build the HTTP backend and open a monitor.
/// `config_path` falls back to the platform config dir.
pub fn open_monitor(config_path: Option<&Path>) -> PairingResult<(PairingMonitor, PairingConfig)> {
    let mut config = match config_path.map(Path::to_path_buf).or_else(engine::pairing::default_config_path) {
        Some(path) => engine::pairing::load_config(&path)?,
        None => PairingConfig::default(),
    };
    config.apply_env();
    let monitor = monitor_from_config(&config)?;
    Ok((monitor, config))
}

/// Build a monitor from an already-resolved config.
pub fn monitor_from_config(config: &PairingConfig) -> PairingResult<PairingMonitor> {
    let backend = HttpPairingBackend::new(config)?;
    let session = AppSession::new(config.token.clone());
    Ok(PairingMonitor::new(Arc::new(backend), session, PollPolicy::from(config)))
}
