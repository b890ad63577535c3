//! One HTTP POST for one subscriber, with per-recipient payload
//! substitution and outcome recording.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::error::{FanoutError, SendOutcome};
use crate::store::Store;
use crate::transport::{Transport, TransportError};
use crate::types::{ProxyAddress, SubscriberId};

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Placeholder token substituted per recipient with the hex SHA-256 of
/// the recipient identifier.
pub const SUBSCRIBER_HASH_PLACEHOLDER: &str = "{subscriber_hash}";

/// Marker in the payload signalling the extended message-component
/// format to the receiver.
const COMPONENTS_MARKER: &str = "\"components\"";

const WITH_COMPONENTS_QUERY: &str = "?with_components=true";

/// A failed attempt that should be retried.
#[derive(Debug, Clone)]
pub struct FailureToken {
    pub subscriber: SubscriberId,
    /// Receiver-specified cooldown when the failure was a rate limit.
    pub cooldown: Option<Duration>,
}

/// Performs one webhook POST per call and resolves every per-recipient
/// failure to a returned token, so it composes inside concurrent batch
/// execution where one recipient must not abort its siblings.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
    base_url: String,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
        base_url: impl Into<String>,
    ) -> Self {
        Self { transport, store, base_url: base_url.into() }
    }

    /// One delivery attempt for one subscriber.
    ///
    /// Returns `None` on terminal outcomes (delivered or unsubscribed)
    /// and a [`FailureToken`] when the attempt should be retried. Only
    /// store unavailability escapes as an error.
    pub async fn send_one(
        &self,
        subscriber: &SubscriberId,
        payload: &[u8],
        proxy: Option<&ProxyAddress>,
    ) -> Result<Option<FailureToken>, FanoutError> {
        let endpoint = self.endpoint_for(subscriber, payload);
        let body = substitute_subscriber_hash(payload, subscriber.as_str());

        let outcome = match self.transport.post(&endpoint, body, proxy).await {
            Ok(response) => classify(&response, &self.base_url),
            Err(TransportError::Timeout) | Err(TransportError::Connect(_)) => {
                SendOutcome::TransientFailure
            }
            Err(TransportError::Other(message)) => {
                warn!(endpoint = %endpoint, error = %message, "unclassified delivery error");
                SendOutcome::TransientFailure
            }
        };

        self.apply_outcome(subscriber, &endpoint, outcome).await
    }

    async fn apply_outcome(
        &self,
        subscriber: &SubscriberId,
        endpoint: &str,
        outcome: SendOutcome,
    ) -> Result<Option<FailureToken>, FanoutError> {
        match outcome {
            SendOutcome::Delivered => {
                metric_inc("fanout.delivery.delivered");
                debug!(endpoint, "delivered");
                Ok(None)
            }
            SendOutcome::Unsubscribed(id) => {
                if let Some(id) = id {
                    self.store.add_unsubscriber(&id).await?;
                }
                metric_inc("fanout.delivery.unsubscribed");
                info!(endpoint, "receiver unsubscribed, will not be sent again");
                Ok(None)
            }
            SendOutcome::RateLimited { retry_after } => {
                metric_inc("fanout.delivery.rate_limited");
                warn!(
                    endpoint,
                    retry_after_secs = retry_after.as_secs(),
                    "receiver rate limited the request"
                );
                Ok(Some(FailureToken {
                    subscriber: subscriber.clone(),
                    cooldown: Some(retry_after),
                }))
            }
            SendOutcome::TransientFailure => {
                metric_inc("fanout.delivery.connection_error");
                warn!(endpoint, "connection-level delivery failure");
                Ok(Some(FailureToken { subscriber: subscriber.clone(), cooldown: None }))
            }
            SendOutcome::PermanentFailure { status, body } => {
                metric_inc("fanout.delivery.rejected");
                warn!(endpoint, status, body = %body, "delivery rejected");
                Ok(Some(FailureToken { subscriber: subscriber.clone(), cooldown: None }))
            }
        }
    }

    fn endpoint_for(&self, subscriber: &SubscriberId, payload: &[u8]) -> String {
        let mut endpoint = format!("{}{}", self.base_url, subscriber.as_str());
        if payload_has_components(payload) {
            endpoint.push_str(WITH_COMPONENTS_QUERY);
        }
        endpoint
    }
}

/// Replace the placeholder with the hex SHA-256 of the subscriber id.
///
/// Deterministic: the same subscriber and payload always produce the
/// same bytes. Payloads that are not valid UTF-8 are sent unmodified
/// rather than failing the send.
pub fn substitute_subscriber_hash(payload: &[u8], subscriber_id: &str) -> Vec<u8> {
    let Ok(text) = std::str::from_utf8(payload) else {
        return payload.to_vec();
    };
    if !text.contains(SUBSCRIBER_HASH_PLACEHOLDER) {
        return payload.to_vec();
    }
    let digest = Sha256::digest(subscriber_id.as_bytes());
    text.replace(SUBSCRIBER_HASH_PLACEHOLDER, &hex::encode(digest))
        .into_bytes()
}

fn payload_has_components(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .map(|text| text.contains(COMPONENTS_MARKER))
        .unwrap_or(false)
}
