// ── Wabi Atoms Layer ───────────────────────────────────────────────────────
// Pure constants, error types and value types: no network, no timers.
// Dependency rule: atoms may only depend on std and external pure crates.
// Nothing here may import from engine/.

pub mod constants;
pub mod error;
pub mod types;
