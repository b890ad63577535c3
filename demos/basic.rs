//! Minimal end-to-end wiring: in-memory store, real HTTP transport,
//! background retry queue.
//!
//! Run with a webhook receiver listening locally:
//! `cargo run --example basic`

use std::sync::Arc;

use webhook_fanout::{
    FanoutConfig, FanoutSender, HttpTransport, InMemoryStore, RequestExecutor, RetryQueue,
    SubscriberId,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = FanoutConfig {
        base_url: "http://localhost:9000/hooks/".to_string(),
        max_concurrency: 2,
        ..FanoutConfig::default()
    };

    let store = Arc::new(InMemoryStore::new());
    let transport = Arc::new(HttpTransport::new(
        config.request_timeout,
        config.proxy_auth(),
    )?);
    let executor = Arc::new(RequestExecutor::new(
        transport,
        store.clone(),
        config.base_url.clone(),
    ));
    let retries = RetryQueue::start(
        executor.clone(),
        config.retry_backoff,
        config.retry_poll_interval,
        config.retry_chunk_size,
    );
    let sender = FanoutSender::new(store, executor, retries.clone(), config);

    let subscribers = vec![
        SubscriberId::new("123/abc"),
        SubscriberId::new("456/def"),
        SubscriberId::new("789/ghi"),
    ];
    sender
        .send(subscribers, br#"{"content": "hello"}"#.to_vec())
        .await?;

    // Give background retries a moment before tearing down.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    retries.shutdown().await;
    Ok(())
}
