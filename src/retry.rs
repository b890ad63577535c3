//! Background retry queue, decoupled from the synchronous send path.
//!
//! A single continuously-running consumer drains the backlog in bounded
//! chunks and re-invokes the request executor with linearly increasing
//! backoff per recipient. Units that exhaust their budget are logged and
//! dropped, never re-enqueued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::executor::RequestExecutor;
use crate::types::RetryUnit;

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Cloneable handle to the shared retry backlog and its drain loop.
///
/// The delivery service is the only producer and the spawned drain loop
/// the only consumer; `enqueue` is a synchronous append and never
/// blocks on in-flight retries.
#[derive(Clone)]
pub struct RetryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    backlog: Mutex<VecDeque<RetryUnit>>,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    executor: Arc<RequestExecutor>,
    backoff: Duration,
    poll_interval: Duration,
    chunk_size: usize,
}

impl RetryQueue {
    /// Create the queue and spawn its drain loop.
    pub fn start(
        executor: Arc<RequestExecutor>,
        backoff: Duration,
        poll_interval: Duration,
        chunk_size: usize,
    ) -> Self {
        let inner = Arc::new(Inner {
            backlog: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(true),
            handle: Mutex::new(None),
            executor,
            backoff,
            poll_interval,
            chunk_size: chunk_size.max(1),
        });

        let handle = tokio::spawn(drain_loop(inner.clone()));
        *lock(&inner.handle) = Some(handle);

        Self { inner }
    }

    /// Append retry units to the backlog.
    pub fn enqueue(&self, units: Vec<RetryUnit>) {
        lock(&self.inner.backlog).extend(units);
    }

    /// Number of units waiting to be drained (excludes units mid-flight).
    pub fn backlog_len(&self) -> usize {
        lock(&self.inner.backlog).len()
    }

    /// Stop the drain loop and wait for its current chunk to resolve.
    /// Backlogged and mid-flight units are abandoned, matching the
    /// no-durability guarantee.
    pub async fn shutdown(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        let handle = lock(&self.inner.handle).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drain_loop(inner: Arc<Inner>) {
    while inner.running.load(Ordering::SeqCst) {
        let chunk: Vec<RetryUnit> = {
            let mut backlog = lock(&inner.backlog);
            let take = inner.chunk_size.min(backlog.len());
            backlog.drain(..take).collect()
        };

        if chunk.is_empty() {
            sleep(inner.poll_interval).await;
            continue;
        }

        let mut tasks = JoinSet::new();
        for unit in chunk {
            let inner = inner.clone();
            tasks.spawn(async move { run_unit(&inner, unit).await });
        }

        // One unit's panic must not take the loop down with it.
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "retry unit aborted");
            }
        }
    }
}

/// Drive one retry unit to success or budget exhaustion.
///
/// The n-th failed call sleeps `n * backoff`, floored by the receiver's
/// requested cooldown when one was supplied, before trying again.
async fn run_unit(inner: &Inner, mut unit: RetryUnit) {
    let mut attempts_used = 0u32;
    let mut cooldown = unit.cooldown.take();

    loop {
        let token = match inner
            .executor
            .send_one(&unit.subscriber, &unit.payload, unit.proxy.as_ref())
            .await
        {
            Ok(None) => return,
            Ok(Some(token)) => token,
            Err(err) => {
                error!(
                    subscriber = %unit.subscriber.0,
                    error = %err,
                    "retry aborted on store failure"
                );
                return;
            }
        };

        if unit.attempts_left == 0 {
            metric_inc("fanout.retry.exhausted");
            warn!(
                subscriber = %unit.subscriber.0,
                attempts = attempts_used + 1,
                "retry budget exhausted, dropping recipient"
            );
            return;
        }

        unit.attempts_left -= 1;
        attempts_used += 1;

        let mut delay = inner.backoff * attempts_used;
        if let Some(requested) = token.cooldown.or_else(|| cooldown.take()) {
            delay = delay.max(requested);
        }
        sleep(delay).await;
    }
}
