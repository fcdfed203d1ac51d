//! Shared Redis connection.
//!
//! The connection is opened lazily on first use, so the process starts (and
//! reports an unhealthy cache) even when Redis is down. `ConnectionManager`
//! reconnects on its own after a dropped connection.

use std::time::Duration;

use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(String),

    #[error("redis command timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        CacheError::Redis(value.to_string())
    }
}

/// Lazily-connected handle shared by the session store and the cache probe.
pub struct RedisConnector {
    client: redis::Client,
    timeout: Duration,
    conn: OnceCell<ConnectionManager>,
}

impl RedisConnector {
    pub fn new(redis_url: impl AsRef<str>, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())?;
        Ok(Self {
            client,
            timeout,
            conn: OnceCell::new(),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one command against the shared connection, bounded by the timeout.
    pub async fn query<T>(&self, cmd: &redis::Cmd) -> Result<T, CacheError>
    where
        T: redis::FromRedisValue,
    {
        let fut = async {
            let conn = self
                .conn
                .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
                .await?;
            let mut conn = conn.clone();
            let value: T = cmd.query_async(&mut conn).await?;
            Ok::<T, CacheError>(value)
        };

        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}
