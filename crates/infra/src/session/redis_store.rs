//! Redis-backed session store.
//!
//! Each session is one JSON string under `sess:<id>` with `EX <ttl>`; a touch
//! is a plain `EXPIRE`, so an untouched record simply ages out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use realmgate_core::SessionId;

use super::{Session, SessionStore, SessionStoreError};
use crate::cache::{CacheError, RedisConnector};

const KEY_PREFIX: &str = "sess:";

pub struct RedisSessionStore {
    redis: Arc<RedisConnector>,
    ttl: Duration,
}

impl RedisSessionStore {
    pub fn new(redis: Arc<RedisConnector>, ttl: Duration) -> Self {
        Self { redis, ttl }
    }

    fn key(id: &SessionId) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

impl From<CacheError> for SessionStoreError {
    fn from(value: CacheError) -> Self {
        match value {
            CacheError::Timeout(_) => SessionStoreError::Timeout,
            CacheError::Redis(msg) => SessionStoreError::Unavailable(msg),
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError> {
        let raw: Option<String> = self.redis.query(redis::cmd("GET").arg(Self::key(id))).await?;
        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| SessionStoreError::Corrupt(e.to_string()))
        })
        .transpose()
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let json =
            serde_json::to_string(session).map_err(|e| SessionStoreError::Corrupt(e.to_string()))?;
        self.redis
            .query::<()>(
                redis::cmd("SET")
                    .arg(Self::key(&session.id))
                    .arg(json)
                    .arg("EX")
                    .arg(self.ttl_secs()),
            )
            .await?;
        Ok(())
    }

    async fn touch(&self, id: &SessionId) -> Result<bool, SessionStoreError> {
        let refreshed: bool = self
            .redis
            .query(redis::cmd("EXPIRE").arg(Self::key(id)).arg(self.ttl_secs()))
            .await?;
        Ok(refreshed)
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        self.redis
            .query::<()>(redis::cmd("DEL").arg(Self::key(id)))
            .await?;
        Ok(())
    }
}
