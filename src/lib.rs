//! A worker node for high-volume webhook fan-out.
//!
//! This crate implements the **delivery pipeline** of a distributed
//! notification fan-out system: given a validated (subscriber list,
//! payload) pair, every subscriber either receives the payload, is
//! recorded as unsubscribed, or is retried a bounded number of times
//! with increasing backoff.
//!
//! ## Guarantees
//! - Bounded in-flight requests (batches are strictly sequential)
//! - Per-recipient isolation: one failure never aborts its batch
//! - Least-used egress proxy rotation via a shared counter store
//! - Receiver-signalled unsubscribes are recorded and never re-sent
//!
//! ## Non-Guarantees
//! - Exactly-once delivery
//! - Retry durability across restarts
//! - Receiver protocol negotiation beyond status-code classification
//!
//! Queue polling, job parsing, and node registration live in external
//! collaborators; this crate starts at [`FanoutSender::send`].

mod classify;
mod error;
mod executor;
mod retry;
mod sender;
mod store;
mod transport;
mod types;

#[cfg(feature = "redis")]
mod store_redis;

pub use classify::{classify, WebhookResponse, DEFAULT_RETRY_AFTER, GLOBAL_COOLDOWN};
pub use error::{FanoutError, SendOutcome, StoreError};
pub use executor::{
    substitute_subscriber_hash, FailureToken, RequestExecutor, SUBSCRIBER_HASH_PLACEHOLDER,
};
pub use retry::RetryQueue;
pub use sender::{exclude_unsubscribers, FanoutConfig, FanoutSender};
pub use store::{InMemoryStore, Store};
pub use transport::{Transport, TransportError};
pub use types::{ProxyAddress, RetryUnit, SubscriberId};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

#[cfg(feature = "redis")]
pub use store_redis::RedisStore;
