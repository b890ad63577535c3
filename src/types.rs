use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque token identifying one webhook endpoint.
///
/// Combined with the configured base webhook URL to form the full
/// endpoint address. This is a strongly-typed wrapper to avoid
/// accidental mixing with other string identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Address of one egress proxy from the shared counter store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyAddress(pub String);

impl ProxyAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

/// A pending re-delivery attempt owned by the retry queue.
///
/// Created from failed batch entries and destroyed when it succeeds or
/// exhausts its attempt budget. Not persisted across restarts.
#[derive(Debug, Clone)]
pub struct RetryUnit {
    pub subscriber: SubscriberId,
    pub payload: Vec<u8>,
    /// Remaining retry attempts after the next one.
    pub attempts_left: u32,
    /// Proxy the original batch was sent through.
    pub proxy: Option<ProxyAddress>,
    /// Receiver-specified cooldown from the failed attempt, if any.
    /// Used as a floor on the first backoff sleep.
    pub cooldown: Option<Duration>,
}
