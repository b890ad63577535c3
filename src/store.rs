use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::ProxyAddress;

/// Shared state behind the delivery pipeline: the egress proxy counters
/// and the unsubscribe set.
///
/// Both the delivery service and the retry queue read and write through
/// this trait without client-side locking; implementations provide the
/// atomicity (the Redis backend uses server-side operations, the
/// in-memory backend a single lock). Any error is treated as fatal by
/// callers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Pick the least-used proxy and increment its usage counter as one
    /// atomic operation. Returns `None` when no proxies are configured,
    /// in which case callers send direct.
    async fn select_proxy(&self) -> Result<Option<ProxyAddress>, StoreError>;

    /// Snapshot of all unsubscribed recipient identifiers.
    async fn unsubscribers(&self) -> Result<HashSet<String>, StoreError>;

    /// Record a receiver-signalled unsubscribe. Idempotent.
    async fn add_unsubscriber(&self, id: &str) -> Result<(), StoreError>;
}

/// In-memory store for tests and lightweight deployments.
#[derive(Default)]
pub struct InMemoryStore {
    proxies: Mutex<BTreeMap<String, i64>>,
    unsubscribers: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a proxy with an initial usage count.
    pub async fn add_proxy(&self, address: impl Into<String>, usage: i64) {
        self.proxies.lock().await.insert(address.into(), usage);
    }

    /// Current usage counter for a proxy, if registered.
    pub async fn proxy_usage(&self, address: &str) -> Option<i64> {
        self.proxies.lock().await.get(address).copied()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn select_proxy(&self) -> Result<Option<ProxyAddress>, StoreError> {
        let mut guard = self.proxies.lock().await;
        // Lowest counter wins, ties broken by key order.
        let selected = guard
            .iter()
            .min_by_key(|(address, usage)| (**usage, address.to_string()))
            .map(|(address, _)| address.clone());

        let Some(address) = selected else {
            return Ok(None);
        };
        if let Some(usage) = guard.get_mut(&address) {
            *usage += 1;
        }
        Ok(Some(ProxyAddress(address)))
    }

    async fn unsubscribers(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.unsubscribers.lock().await.clone())
    }

    async fn add_unsubscriber(&self, id: &str) -> Result<(), StoreError> {
        self.unsubscribers.lock().await.insert(id.to_string());
        Ok(())
    }
}
