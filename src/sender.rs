use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::error;

use crate::error::FanoutError;
use crate::executor::{FailureToken, RequestExecutor};
use crate::retry::RetryQueue;
use crate::store::Store;
use crate::types::{ProxyAddress, RetryUnit, SubscriberId};

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Configuration surface consumed by the delivery pipeline.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Base webhook URL; the subscriber id is appended to it.
    pub base_url: String,
    /// Maximum concurrent in-flight requests per batch. Caps open
    /// connections, not throughput.
    pub max_concurrency: usize,
    /// Timeout for a single delivery attempt.
    pub request_timeout: Duration,
    /// Credentials applied to every proxied client.
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
    /// Retry attempts granted to each failed recipient.
    pub retry_attempts: u32,
    /// Unit of the linear retry backoff: the n-th retry sleeps n times
    /// this long, floored by any receiver-specified cooldown.
    pub retry_backoff: Duration,
    /// How long the retry drain loop sleeps when its backlog is empty.
    pub retry_poll_interval: Duration,
    /// How many retry units the drain loop runs concurrently per pass.
    pub retry_chunk_size: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            base_url: "https://discord.com/api/webhooks/".to_string(),
            max_concurrency: 10,
            request_timeout: Duration::from_secs(5),
            proxy_username: None,
            proxy_password: None,
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(3),
            retry_poll_interval: Duration::from_millis(500),
            retry_chunk_size: 10,
        }
    }
}

impl FanoutConfig {
    pub fn proxy_auth(&self) -> Option<(String, String)> {
        match (&self.proxy_username, &self.proxy_password) {
            (Some(username), Some(password)) => {
                Some((username.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

/// Orchestrates one full send: exclude unsubscribed recipients, partition
/// into bounded batches, execute each batch concurrently, hand failures
/// to the retry queue.
///
/// Owns the send end-to-end but not the retries: `send` returns once all
/// batches have been dispatched, without awaiting retry resolution.
pub struct FanoutSender {
    store: Arc<dyn Store>,
    executor: Arc<RequestExecutor>,
    retries: RetryQueue,
    config: FanoutConfig,
    busy: AtomicBool,
}

impl FanoutSender {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<RequestExecutor>,
        retries: RetryQueue,
        config: FanoutConfig,
    ) -> Self {
        Self { store, executor, retries, config, busy: AtomicBool::new(false) }
    }

    /// Whether a send is currently in flight. Shutdown waits for idle
    /// before terminating tasks.
    pub fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    /// Deliver `payload` to every subscriber in the list.
    ///
    /// Returns after all batches have been dispatched; failed recipients
    /// keep retrying in the background. Errors only on a malformed job
    /// or an unreachable shared store.
    pub async fn send(
        &self,
        subscribers: Vec<SubscriberId>,
        payload: Vec<u8>,
    ) -> Result<(), FanoutError> {
        if subscribers.is_empty() {
            return Err(FanoutError::InvalidJob { message: "subscribers is empty".to_string() });
        }
        if payload.is_empty() {
            return Err(FanoutError::InvalidJob { message: "payload is empty".to_string() });
        }

        self.busy.store(true, Ordering::SeqCst);
        let result = self.send_inner(subscribers, payload).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn send_inner(
        &self,
        subscribers: Vec<SubscriberId>,
        payload: Vec<u8>,
    ) -> Result<(), FanoutError> {
        // Snapshot read: recipients unsubscribed by a concurrent send may
        // still receive this batch. Duplicate sends to a freshly
        // unsubscribed endpoint are self-limiting.
        let unsubscribers = self.store.unsubscribers().await?;
        let active = exclude_unsubscribers(subscribers, &unsubscribers);
        let payload = Arc::new(payload);

        for batch in active.chunks(self.config.max_concurrency.max(1)) {
            // One proxy per batch; selection cost is amortized across
            // the whole chunk.
            let proxy = self.store.select_proxy().await?;
            metric_inc("fanout.send.batches");

            let failures = self.run_batch(batch, &payload, proxy.as_ref()).await?;
            if failures.is_empty() {
                continue;
            }

            let units = failures
                .into_iter()
                .map(|token| RetryUnit {
                    subscriber: token.subscriber,
                    payload: payload.as_ref().clone(),
                    attempts_left: self.config.retry_attempts,
                    proxy: proxy.clone(),
                    cooldown: token.cooldown,
                })
                .collect();
            self.retries.enqueue(units);
        }

        Ok(())
    }

    /// Execute one batch concurrently and collect its failure tokens.
    /// Batches are strictly sequential, so peak in-flight requests never
    /// exceed `max_concurrency`.
    async fn run_batch(
        &self,
        batch: &[SubscriberId],
        payload: &Arc<Vec<u8>>,
        proxy: Option<&ProxyAddress>,
    ) -> Result<Vec<FailureToken>, FanoutError> {
        let mut tasks = JoinSet::new();
        for subscriber in batch {
            let executor = self.executor.clone();
            let payload = payload.clone();
            let subscriber = subscriber.clone();
            let proxy = proxy.cloned();
            tasks.spawn(async move {
                executor.send_one(&subscriber, &payload, proxy.as_ref()).await
            });
        }

        let mut failures = Vec::new();
        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some(token))) => failures.push(token),
                Ok(Ok(None)) => {}
                // Let the batch drain before surfacing a fatal error.
                Ok(Err(err)) => fatal = Some(err),
                Err(err) => {
                    error!(error = %err, "delivery task aborted");
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(failures),
        }
    }
}

/// Subtract the unsubscribe set from the subscriber list, dropping
/// duplicates while preserving first-seen order.
pub fn exclude_unsubscribers(
    subscribers: Vec<SubscriberId>,
    unsubscribers: &HashSet<String>,
) -> Vec<SubscriberId> {
    let mut seen = HashSet::new();
    subscribers
        .into_iter()
        .filter(|subscriber| {
            !unsubscribers.contains(&subscriber.0) && seen.insert(subscriber.0.clone())
        })
        .collect()
}
