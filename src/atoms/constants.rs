// ── Wabi Atoms: Constants ──────────────────────────────────────────────────
// All named constants for the crate live here.

// ── Backend defaults ──────────────────────────────────────────────────────
pub const DEFAULT_API_URL: &str = "https://v3-wabi.cloudious.net";
pub const DEFAULT_CONNECT_PATH: &str = "/pairing/connect";
pub const DEFAULT_STATUS_PATH: &str = "/pairing/status";

// ── Polling policy ────────────────────────────────────────────────────────
// One throttle floor for every check path (timer tick and explicit "check now").
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MIN_CHECK_INTERVAL_SECS: u64 = 5;

// Per-request bound on both pairing calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

// ── Config file location ──────────────────────────────────────────────────
// Resolved under `dirs::config_dir()`.
pub(crate) const CONFIG_DIR_NAME: &str = "wabi";
pub(crate) const CONFIG_FILE_NAME: &str = "pairing.toml";

// ── Environment overrides ─────────────────────────────────────────────────
pub const ENV_API_URL: &str = "WABI_API_URL";
pub const ENV_TOKEN: &str = "WABI_TOKEN";

// Response bodies are truncated to this many chars in logs and errors.
pub(crate) const LOG_BODY_LIMIT: usize = 500;

// Capacity of the pairing event broadcast channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 32;
