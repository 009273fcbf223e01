// ── Wabi Atoms: Pure Data Types ────────────────────────────────────────────
// Plain struct/enum definitions shared by the engine and its callers.
// Atoms layer rule: no I/O, no imports from engine/.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::error::{PairingError, PairingResult};

// ── Pairing image ──────────────────────────────────────────────────────────

/// The scannable artifact a phone uses to link its account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PairingImage {
    /// `data:image/png;base64,...`
    DataUri(String),
    /// http(s) link to a hosted image
    Url(String),
    /// Raw pairing payload (or bare base64 the backend did not wrap)
    Code(String),
}

impl PairingImage {
    /// Classify a string returned by the backend.
    pub fn from_backend(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("data:") {
            PairingImage::DataUri(raw.to_string())
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            PairingImage::Url(raw.to_string())
        } else {
            PairingImage::Code(raw.to_string())
        }
    }

    /// Decode the image bytes. Data URIs are trusted; a bare code only decodes
    /// when its bytes are a PNG.
    pub fn decode(&self) -> PairingResult<Vec<u8>> {
        match self {
            PairingImage::DataUri(uri) => {
                let payload = uri
                    .split_once(";base64,")
                    .map(|(_, data)| data)
                    .ok_or_else(|| PairingError::InvalidImage("data URI is not base64-encoded".into()))?;
                decode_base64(payload)
            }
            PairingImage::Code(code) => {
                let bytes = decode_base64(code)?;
                if !bytes.starts_with(PNG_SIGNATURE) {
                    return Err(PairingError::InvalidImage("pairing code is not an encoded image".into()));
                }
                Ok(bytes)
            }
            PairingImage::Url(url) => Err(PairingError::InvalidImage(format!("image is hosted at {}", url))),
        }
    }

    /// File extension matching the image's declared type.
    pub fn file_extension(&self) -> Option<&'static str> {
        match self {
            PairingImage::DataUri(_) => match self.mime_type()? {
                "image/png" => Some("png"),
                "image/jpeg" | "image/jpg" => Some("jpg"),
                "image/gif" => Some("gif"),
                "image/webp" => Some("webp"),
                "image/svg+xml" => Some("svg"),
                _ => None,
            },
            PairingImage::Code(_) => Some("png"),
            PairingImage::Url(_) => None,
        }
    }

    /// MIME type declared by a data URI, if any.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            PairingImage::DataUri(uri) => uri
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .filter(|m| !m.is_empty()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PairingImage::DataUri(s) | PairingImage::Url(s) | PairingImage::Code(s) => s,
        }
    }
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn decode_base64(payload: &str) -> PairingResult<Vec<u8>> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| PairingError::InvalidImage(e.to_string()))
}

// ── Pairing session ────────────────────────────────────────────────────────

/// In-memory state of one open pairing UI.
#[derive(Debug, Clone, Serialize)]
pub struct PairingSession {
    pub connected: bool,
    /// Present only while `connected` is false.
    pub pairing_image: Option<PairingImage>,
    pub instance_key: String,
    /// Monotonic time of the last effective status check.
    #[serde(skip)]
    pub last_polled_at: Option<Instant>,
    pub polling_active: bool,
}

impl PairingSession {
    pub fn awaiting_scan(image: PairingImage, instance_key: impl Into<String>) -> Self {
        PairingSession {
            connected: false,
            pairing_image: Some(image),
            instance_key: instance_key.into(),
            last_polled_at: None,
            polling_active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPhase {
    Idle,
    Fetching,
    AwaitingScan,
    Checking,
    Connected,
    Error,
}

impl PairingPhase {
    pub fn is_terminal(self) -> bool {
        self == PairingPhase::Connected
    }
}

/// Result of a pairing-code request.
#[derive(Debug, Clone)]
pub enum PairingOutcome {
    /// A code is ready to display; the caller decides when to start polling.
    AwaitingScan(PairingSession),
    /// The account was already linked; nothing to show.
    AlreadyConnected { instance_key: Option<String> },
}

impl PairingOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, PairingOutcome::AlreadyConnected { .. })
    }
}

// ── Backend replies ────────────────────────────────────────────────────────

/// Parsed reply of the connect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReply {
    pub connected: bool,
    pub pairing_image: Option<PairingImage>,
    pub instance_key: Option<String>,
}

/// Link state reported by the status call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    /// Any other state string the backend returns (e.g. "PENDING", "close").
    Pending(String),
}

impl LinkStatus {
    pub fn from_state(state: &str) -> Self {
        if state.eq_ignore_ascii_case("connected") || state.eq_ignore_ascii_case("open") {
            LinkStatus::Connected
        } else {
            LinkStatus::Pending(state.to_string())
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, LinkStatus::Connected)
    }
}

// ── Shared link state ──────────────────────────────────────────────────────

/// Application-wide "is the account linked" view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub whatsapp_connected: bool,
    pub instance_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState { whatsapp_connected: false, instance_key: None, updated_at: Utc::now() }
    }
}
