#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use webhook_fanout::{
    FanoutConfig, FanoutSender, InMemoryStore, ProxyAddress, RequestExecutor, RetryQueue,
    Transport, TransportError, WebhookResponse,
};

/// One recorded transport call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub body: Vec<u8>,
    pub proxy: Option<String>,
}

type Script = dyn Fn(&str, &[u8]) -> Result<WebhookResponse, TransportError> + Send + Sync;

/// Transport double that answers from a closure and records every call.
pub struct ScriptedTransport {
    script: Box<Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str, &[u8]) -> Result<WebhookResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self { script: Box::new(script), calls: Mutex::new(Vec::new()) })
    }

    /// Always answer with the given status and an empty body.
    pub fn with_status(status: u16) -> Arc<Self> {
        Self::new(move |url, _| Ok(response(status, url)))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        proxy: Option<&ProxyAddress>,
    ) -> Result<WebhookResponse, TransportError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            url: url.to_string(),
            body: body.clone(),
            proxy: proxy.map(|p| p.0.clone()),
        });
        (self.script)(url, &body)
    }
}

pub const BASE_URL: &str = "https://hooks.test/";

pub fn response(status: u16, url: &str) -> WebhookResponse {
    WebhookResponse {
        status,
        content_type: None,
        final_url: url.to_string(),
        body: Vec::new(),
    }
}

pub fn json_response(status: u16, url: &str, body: &str) -> WebhookResponse {
    WebhookResponse {
        status,
        content_type: Some("application/json".to_string()),
        final_url: url.to_string(),
        body: body.as_bytes().to_vec(),
    }
}

/// Small, fast config for tests.
pub fn test_config() -> FanoutConfig {
    FanoutConfig {
        base_url: BASE_URL.to_string(),
        max_concurrency: 2,
        retry_attempts: 1,
        retry_backoff: Duration::from_secs(1),
        retry_poll_interval: Duration::from_millis(50),
        retry_chunk_size: 10,
        ..FanoutConfig::default()
    }
}

pub struct Pipeline {
    pub store: Arc<InMemoryStore>,
    pub executor: Arc<RequestExecutor>,
    pub retries: RetryQueue,
    pub sender: FanoutSender,
}

/// Wire a full pipeline around a scripted transport and in-memory store.
pub fn pipeline(transport: Arc<ScriptedTransport>, config: FanoutConfig) -> Pipeline {
    let store = Arc::new(InMemoryStore::new());
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
    let sender = FanoutSender::new(store.clone(), executor.clone(), retries.clone(), config);
    Pipeline { store, executor, retries, sender }
}
