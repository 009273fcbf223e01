// Wabi Engine: WhatsApp Account Pairing
//
// Module layout:
//   config : PairingConfig, default_config_path, load/save, env overrides
//   api    : PairingBackend trait, HttpPairingBackend, reply parsing
//   events : PairingEvent broadcast for whatever renders the pairing screen
//   monitor: PairingMonitor: request code, throttled status checks, poll timer, teardown

pub mod api;
pub mod config;
pub mod events;
pub mod monitor;

// ── Re-exports ─────────────────────────────────────────────────────────

pub use api::{HttpPairingBackend, PairingBackend};
pub use config::{default_config_path, load_config, save_config, PairingConfig};
pub use events::PairingEvent;
pub use monitor::{MonitorSnapshot, PairingMonitor, PollPolicy};
