// ── Wabi Engine: HTTP Client Helpers ────────────────────────────────────────
//
// Shared reqwest plumbing for the pairing backend:
//   • Client factory with a hard per-request timeout
//   • Body truncation for logs and error messages
//   • Transient-status detection for the retry affordance shown to users

use crate::atoms::constants::LOG_BODY_LIMIT;
use crate::atoms::error::PairingResult;
use log::info;
use reqwest::Client;
use std::time::Duration;

/// Build the client used for every pairing call.
/// Both calls are bounded by `timeout`; the transport default has none.
pub fn build_client(timeout: Duration) -> PairingResult<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("wabi-pairing/", env!("CARGO_PKG_VERSION")))
        .build()?;
    info!("[http] Client ready (timeout {}s)", timeout.as_secs());
    Ok(client)
}

/// Truncate a response body on a char boundary.
pub fn truncate_body(text: &str) -> String {
    if text.chars().count() <= LOG_BODY_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(LOG_BODY_LIMIT).collect();
    out.push('…');
    out
}

/// Check if an HTTP status code represents a transient error worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn short_bodies_are_untouched() {
        assert_eq!(truncate_body("{\"ok\":true}"), "{\"ok\":true}");
    }

    #[test]
    fn long_bodies_are_cut_on_char_boundary() {
        let body = "é".repeat(LOG_BODY_LIMIT + 20);
        let cut = truncate_body(&body);
        assert_eq!(cut.chars().count(), LOG_BODY_LIMIT + 1);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn client_builds_with_timeout() {
        assert!(build_client(Duration::from_secs(15)).is_ok());
    }
}
