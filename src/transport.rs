use std::fmt;

use async_trait::async_trait;

use crate::classify::WebhookResponse;
use crate::types::ProxyAddress;

/// How a single webhook POST reaches the network.
///
/// The executor talks to this trait so batch and retry behavior can be
/// exercised against canned responses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` with `Content-Type: application/json`,
    /// optionally through the given egress proxy.
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        proxy: Option<&ProxyAddress>,
    ) -> Result<WebhookResponse, TransportError>;
}

/// Connection-level failure: no classifiable response was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect(String),
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout =>
                write!(f, "request timed out"),
            TransportError::Connect(message) =>
                write!(f, "connection failed: {message}"),
            TransportError::Other(message) =>
                write!(f, "request failed: {message}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[cfg(feature = "http")]
pub use http_transport::HttpTransport;

#[cfg(feature = "http")]
mod http_transport {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::RwLock;

    use super::{Transport, TransportError};
    use crate::classify::WebhookResponse;
    use crate::types::ProxyAddress;

    /// Real HTTP transport built on `reqwest`.
    ///
    /// `reqwest` binds the proxy at client construction, so one client is
    /// built and cached per proxy address; direct sends share a single
    /// unproxied client.
    pub struct HttpTransport {
        direct: reqwest::Client,
        proxied: RwLock<HashMap<String, reqwest::Client>>,
        timeout: Duration,
        proxy_auth: Option<(String, String)>,
    }

    impl HttpTransport {
        pub fn new(
            timeout: Duration,
            proxy_auth: Option<(String, String)>,
        ) -> Result<Self, TransportError> {
            let direct = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| TransportError::Other(err.to_string()))?;

            Ok(Self {
                direct,
                proxied: RwLock::new(HashMap::new()),
                timeout,
                proxy_auth,
            })
        }

        async fn client_for(
            &self,
            proxy: Option<&ProxyAddress>,
        ) -> Result<reqwest::Client, TransportError> {
            let Some(proxy) = proxy else {
                return Ok(self.direct.clone());
            };

            if let Some(client) = self.proxied.read().await.get(&proxy.0) {
                return Ok(client.clone());
            }

            let mut configured = reqwest::Proxy::all(&proxy.0)
                .map_err(|err| TransportError::Connect(err.to_string()))?;
            if let Some((username, password)) = &self.proxy_auth {
                configured = configured.basic_auth(username, password);
            }

            let client = reqwest::Client::builder()
                .timeout(self.timeout)
                .proxy(configured)
                .build()
                .map_err(|err| TransportError::Other(err.to_string()))?;

            self.proxied
                .write()
                .await
                .insert(proxy.0.clone(), client.clone());
            Ok(client)
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn post(
            &self,
            url: &str,
            body: Vec<u8>,
            proxy: Option<&ProxyAddress>,
        ) -> Result<WebhookResponse, TransportError> {
            let client = self.client_for(proxy).await?;

            let response = client
                .post(url)
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        TransportError::Timeout
                    } else if err.is_connect() {
                        TransportError::Connect(err.to_string())
                    } else {
                        TransportError::Other(err.to_string())
                    }
                })?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let final_url = response.url().to_string();
            let body = response
                .bytes()
                .await
                .map_err(|err| TransportError::Other(err.to_string()))?
                .to_vec();

            Ok(WebhookResponse { status, content_type, final_url, body })
        }
    }
}
