#[cfg(feature = "redis")]
use std::collections::HashSet;

#[cfg(feature = "redis")]
use async_trait::async_trait;
#[cfg(feature = "redis")]
use redis::AsyncCommands;

#[cfg(feature = "redis")]
use crate::error::StoreError;
#[cfg(feature = "redis")]
use crate::store::Store;
#[cfg(feature = "redis")]
use crate::types::ProxyAddress;

/// Sorted set of proxy addresses scored by usage count.
#[cfg(feature = "redis")]
const PROXIES_KEY: &str = "proxies";

/// Set of recipient identifiers that opted out.
#[cfg(feature = "redis")]
const UNSUBSCRIBERS_KEY: &str = "unsubscribers";

/// Reads the lowest-scored proxy and bumps its score in one script so
/// two concurrent callers cannot pick the same "least used" entry.
#[cfg(feature = "redis")]
const SELECT_PROXY_SCRIPT: &str = r"
local selected = redis.call('ZRANGE', KEYS[1], 0, 0)
if selected[1] == nil then
    return false
end
redis.call('ZINCRBY', KEYS[1], 1, selected[1])
return selected[1]
";

/// Production store backed by the shared Redis instance.
///
/// Errors are surfaced instead of swallowed: the pipeline must stop
/// rather than run without proxy counters or the unsubscribe set.
#[cfg(feature = "redis")]
pub struct RedisStore {
    client: redis::Client,
}

#[cfg(feature = "redis")]
impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::Connection, StoreError> {
        self.client
            .get_tokio_connection()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl Store for RedisStore {
    async fn select_proxy(&self) -> Result<Option<ProxyAddress>, StoreError> {
        let mut conn = self.connection().await?;
        let selected: Option<String> = redis::Script::new(SELECT_PROXY_SCRIPT)
            .key(PROXIES_KEY)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(selected.map(ProxyAddress))
    }

    async fn unsubscribers(&self) -> Result<HashSet<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.smembers(UNSUBSCRIBERS_KEY)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    async fn add_unsubscriber(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .sadd(UNSUBSCRIBERS_KEY, id)
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        Ok(())
    }
}
