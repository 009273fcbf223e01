// ── Wabi Atoms: Error Types ────────────────────────────────────────────────
// Single canonical error enum for the pairing engine, built with `thiserror`.
//
// Design rules:
//   • Only `CredentialMissing` and `PairingRequestFailed` are meant for the user.
//     Everything else is logged and recovered below the caller.
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • No variant carries the bearer credential in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PairingError {
    /// No session credential is available. The caller must re-authenticate.
    #[error("No session credential available, sign in again")]
    CredentialMissing,

    /// The backend refused or failed to mint a pairing code.
    #[error("Pairing request failed ({status}): {message}")]
    PairingRequestFailed { status: u16, message: String },

    /// A link-status check failed. Never surfaced; the poll loop retries on its own.
    #[error("Status check failed: {0}")]
    StatusCheckFailed(String),

    /// A pairing-code request is already in flight for this monitor.
    #[error("A pairing request is already in progress")]
    RequestInFlight,

    /// The monitor was torn down; the result was discarded.
    #[error("Pairing monitor is closed")]
    Closed,

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pairing image could not be decoded to bytes.
    #[error("Invalid pairing image: {0}")]
    InvalidImage(String),
}

// ── Classification ─────────────────────────────────────────────────────────

impl PairingError {
    /// Create a request failure from an HTTP status and response body.
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::PairingRequestFailed { status, message: message.into() }
    }

    /// Whether this error should be shown to the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::CredentialMissing | Self::PairingRequestFailed { .. })
    }

    /// Whether re-invoking the pairing request may succeed.
    /// `CredentialMissing` is not retryable: the caller must redirect to sign-in.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PairingRequestFailed { .. } | Self::Network(_) | Self::Serialization(_) | Self::RequestInFlight
        )
    }
}

impl From<toml::de::Error> for PairingError {
    fn from(e: toml::de::Error) -> Self {
        PairingError::Config(e.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All pairing operations return this type.
pub type PairingResult<T> = Result<T, PairingError>;

// ── Conversion: PairingError → String ──────────────────────────────────────

impl From<PairingError> for String {
    fn from(e: PairingError) -> Self {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_credential_and_request_failures_are_user_visible() {
        assert!(PairingError::CredentialMissing.is_user_visible());
        assert!(PairingError::request_failed(502, "bad gateway").is_user_visible());
        assert!(!PairingError::StatusCheckFailed("timeout".into()).is_user_visible());
        assert!(!PairingError::Closed.is_user_visible());
        assert!(!PairingError::Config("empty".into()).is_user_visible());
    }

    #[test]
    fn credential_missing_is_not_retryable() {
        assert!(!PairingError::CredentialMissing.is_retryable());
        assert!(!PairingError::Closed.is_retryable());
        assert!(PairingError::request_failed(500, "").is_retryable());
    }

    #[test]
    fn request_failed_message_includes_status() {
        let msg: String = PairingError::request_failed(503, "unavailable").into();
        assert_eq!(msg, "Pairing request failed (503): unavailable");
    }
}
