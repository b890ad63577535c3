//! Pure classification of completed webhook responses.
//!
//! Reproducible from a canned (status, content type, final URL, body)
//! quadruple with no network access.

use std::time::Duration;

use crate::error::SendOutcome;

/// Cooldown applied when a 429 body is absent, non-JSON, or carries no
/// usable `retry_after`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(3);

/// Fixed cooldown for globally scoped rate limits, regardless of the
/// `retry_after` the body carries.
pub const GLOBAL_COOLDOWN: Duration = Duration::from_secs(60);

/// A completed HTTP response reduced to what classification needs.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// URL the request resolved to after redirects.
    pub final_url: String,
    pub body: Vec<u8>,
}

/// Map a completed response to a [`SendOutcome`].
///
/// - 204 is the only success status.
/// - 401/403/404 mean the receiver no longer wants this endpoint's
///   traffic; the unsubscribe identifier is recovered from the final URL
///   when it still matches `{base_url}{suffix}`.
/// - 429 carries a receiver-specified cooldown.
/// - Everything else is a permanent failure with diagnostics attached.
pub fn classify(response: &WebhookResponse, base_url: &str) -> SendOutcome {
    match response.status {
        204 => SendOutcome::Delivered,
        401 | 403 | 404 => {
            SendOutcome::Unsubscribed(parse_unsubscriber(&response.final_url, base_url))
        }
        429 => SendOutcome::RateLimited { retry_after: parse_retry_after(response) },
        status => SendOutcome::PermanentFailure {
            status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        },
    }
}

/// Extract the recipient-specific suffix from a response URL.
///
/// A redirected or rewritten URL that no longer starts with the base
/// webhook URL yields `None`: recording an identifier from it would
/// unsubscribe the wrong recipient.
fn parse_unsubscriber(final_url: &str, base_url: &str) -> Option<String> {
    let suffix = final_url.strip_prefix(base_url)?;
    if suffix.is_empty() || suffix.chars().any(char::is_whitespace) {
        return None;
    }
    Some(suffix.to_string())
}

/// Read the cooldown from a 429 response body.
///
/// The body is only consulted when the response declares
/// `application/json`. A `"global": true` flag forces the fixed global
/// cooldown; otherwise fractional `retry_after` seconds are rounded up.
fn parse_retry_after(response: &WebhookResponse) -> Duration {
    let is_json = response
        .content_type
        .as_deref()
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return DEFAULT_RETRY_AFTER;
    }

    let Ok(body) = serde_json::from_slice::<serde_json::Value>(&response.body) else {
        return DEFAULT_RETRY_AFTER;
    };

    if body.get("global").and_then(|v| v.as_bool()).unwrap_or(false) {
        return GLOBAL_COOLDOWN;
    }

    match body.get("retry_after").and_then(|v| v.as_f64()) {
        Some(secs) if secs > 0.0 => Duration::from_secs(secs.ceil() as u64),
        _ => DEFAULT_RETRY_AFTER,
    }
}
