// Pairing: Backend API
// PairingBackend trait, HttpPairingBackend, parse_connect_reply, parse_status_reply

use super::config::PairingConfig;
use crate::atoms::error::{PairingError, PairingResult};
use crate::atoms::types::{ConnectReply, LinkStatus, PairingImage};
use crate::engine::http::{build_client, is_retryable_status, truncate_body};
use async_trait::async_trait;
use log::{info, warn};
use serde_json::{json, Value};

// ── Backend seam ───────────────────────────────────────────────────────

/// The two remote operations the monitor depends on.
#[async_trait]
pub trait PairingBackend: Send + Sync {
    /// Mint a pairing code for the account behind `credential`.
    async fn connect(&self, credential: &str) -> PairingResult<ConnectReply>;

    /// Point-in-time link status for the account behind `credential`.
    async fn status(&self, credential: &str) -> PairingResult<LinkStatus>;
}

// ── HTTP implementation ────────────────────────────────────────────────

pub struct HttpPairingBackend {
    client: reqwest::Client,
    connect_url: String,
    status_url: String,
}

impl HttpPairingBackend {
    pub fn new(config: &PairingConfig) -> PairingResult<Self> {
        config.validate()?;
        Ok(HttpPairingBackend {
            client: build_client(config.request_timeout())?,
            connect_url: config.endpoint(&config.connect_path),
            status_url: config.endpoint(&config.status_path),
        })
    }
}

#[async_trait]
impl PairingBackend for HttpPairingBackend {
    async fn connect(&self, credential: &str) -> PairingResult<ConnectReply> {
        let resp = self
            .client
            .post(&self.connect_url)
            .bearer_auth(credential)
            .json(&json!({}))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        info!("[pairing] Connect response [{}]: {}", status, truncate_body(&text));

        if !status.is_success() {
            if is_retryable_status(status.as_u16()) {
                warn!("[pairing] Connect failed with transient status {}", status);
            }
            return Err(PairingError::request_failed(status.as_u16(), truncate_body(&text)));
        }

        let body: Value = serde_json::from_str(&text)?;
        Ok(parse_connect_reply(&body))
    }

    async fn status(&self, credential: &str) -> PairingResult<LinkStatus> {
        let resp = self
            .client
            .post(&self.status_url)
            .bearer_auth(credential)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| PairingError::StatusCheckFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PairingError::StatusCheckFailed(format!("{}: {}", status, truncate_body(&text))));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| PairingError::StatusCheckFailed(e.to_string()))?;
        parse_status_reply(&body)
    }
}

// ── Response parsing ───────────────────────────────────────────────────

/// Extract the connect reply from the shapes the backend has used over time:
///   { "connected": false, "pairingImage": "data:image/...", "instanceKey": "abc" }
///   { "qrcode": { "base64": "data:image/..." }, "instance": { "instanceName": "abc" } }
///   { "base64": "data:image/..." } / { "qr": "..." }
pub fn parse_connect_reply(body: &Value) -> ConnectReply {
    let connected = body["connected"].as_bool().unwrap_or(false)
        || body["instance"]["state"]
            .as_str()
            .map(|s| LinkStatus::from_state(s).is_connected())
            .unwrap_or(false);

    let image = body["pairingImage"].as_str()
        .or_else(|| body["qrcode"]["base64"].as_str())
        .or_else(|| body["qrcode"].as_str())
        .or_else(|| body["base64"].as_str())
        .or_else(|| body["qr"].as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PairingImage::from_backend);

    let instance_key = body["instanceKey"].as_str()
        .or_else(|| body["instance_key"].as_str())
        .or_else(|| body["instance"]["instanceName"].as_str())
        .or_else(|| body["key"].as_str())
        .map(str::to_string);

    if !connected && image.is_none() {
        warn!(
            "[pairing] Connect reply carried no pairing image. keys: {:?}",
            body.as_object().map(|o| o.keys().collect::<Vec<_>>())
        );
    }

    ConnectReply { connected, pairing_image: if connected { None } else { image }, instance_key }
}

/// Extract the link state: `{ "state": "CONNECTED" }` or `{ "instance": { "state": "open" } }`.
pub fn parse_status_reply(body: &Value) -> PairingResult<LinkStatus> {
    body["state"].as_str()
        .or_else(|| body["instance"]["state"].as_str())
        .map(LinkStatus::from_state)
        .ok_or_else(|| PairingError::StatusCheckFailed(format!("no state in reply: {}", truncate_body(&body.to_string()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_connect_reply() {
        let reply = parse_connect_reply(&json!({
            "connected": false,
            "pairingImage": "data:image/png;base64,AAAA",
            "instanceKey": "abc",
        }));
        assert!(!reply.connected);
        assert_eq!(reply.pairing_image, Some(PairingImage::DataUri("data:image/png;base64,AAAA".into())));
        assert_eq!(reply.instance_key.as_deref(), Some("abc"));
    }

    #[test]
    fn parses_nested_qrcode_reply() {
        let reply = parse_connect_reply(&json!({
            "qrcode": { "code": "2@xyz", "base64": "data:image/png;base64,BBBB" },
            "instance": { "instanceName": "slot-7", "state": "connecting" },
        }));
        assert!(!reply.connected);
        assert_eq!(reply.pairing_image.unwrap().as_str(), "data:image/png;base64,BBBB");
        assert_eq!(reply.instance_key.as_deref(), Some("slot-7"));
    }

    #[test]
    fn connected_reply_drops_image() {
        let reply = parse_connect_reply(&json!({
            "connected": true,
            "pairingImage": "data:image/png;base64,AAAA",
            "instanceKey": "abc",
        }));
        assert!(reply.connected);
        assert_eq!(reply.pairing_image, None);
    }

    #[test]
    fn open_instance_state_counts_as_connected() {
        let reply = parse_connect_reply(&json!({ "instance": { "state": "open" } }));
        assert!(reply.connected);
    }

    #[test]
    fn empty_image_is_none() {
        let reply = parse_connect_reply(&json!({ "pairingImage": "" }));
        assert_eq!(reply.pairing_image, None);
        assert!(!reply.connected);
    }

    #[test]
    fn parses_status_shapes() {
        assert_eq!(parse_status_reply(&json!({ "state": "CONNECTED" })).unwrap(), LinkStatus::Connected);
        assert_eq!(parse_status_reply(&json!({ "instance": { "state": "open" } })).unwrap(), LinkStatus::Connected);
        assert_eq!(
            parse_status_reply(&json!({ "state": "PENDING" })).unwrap(),
            LinkStatus::Pending("PENDING".into())
        );
        assert!(matches!(parse_status_reply(&json!({})), Err(PairingError::StatusCheckFailed(_))));
    }

    #[test]
    fn http_backend_rejects_invalid_config() {
        let cfg = PairingConfig { api_url: String::new(), ..Default::default() };
        assert!(matches!(HttpPairingBackend::new(&cfg), Err(PairingError::Config(_))));
    }
}
