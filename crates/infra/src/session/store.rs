use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use realmgate_core::{GatewayError, SessionId};

use super::Session;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt session record: {0}")]
    Corrupt(String),

    #[error("session store timed out")]
    Timeout,
}

impl From<SessionStoreError> for GatewayError {
    fn from(value: SessionStoreError) -> Self {
        GatewayError::dependency(value.to_string())
    }
}

/// Shared key-value backing for sessions with a rolling TTL.
///
/// Different sessions never collide; concurrent writes to the same session are
/// last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Time-to-live applied on every save/touch.
    fn ttl(&self) -> Duration;

    /// Load a live session. Expired or unknown ids yield `None`.
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError>;

    /// Write the whole session and reset its TTL.
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Reset the TTL without rewriting the record. Returns `false` when the
    /// session no longer exists.
    async fn touch(&self, id: &SessionId) -> Result<bool, SessionStoreError>;

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionStoreError>;
}

#[async_trait]
impl<S> SessionStore for Arc<S>
where
    S: SessionStore + ?Sized,
{
    fn ttl(&self) -> Duration {
        (**self).ttl()
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError> {
        (**self).load(id).await
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        (**self).save(session).await
    }

    async fn touch(&self, id: &SessionId) -> Result<bool, SessionStoreError> {
        (**self).touch(id).await
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        (**self).destroy(id).await
    }
}

/// In-memory session store for tests/dev.
#[derive(Debug)]
pub struct InMemorySessionStore {
    ttl: Duration,
    inner: RwLock<HashMap<SessionId, (Session, Instant)>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        match self.inner.read() {
            Ok(map) => map.values().filter(|(_, exp)| *exp > now).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> SessionStoreError {
        SessionStoreError::Unavailable("in-memory session lock poisoned".into())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionStoreError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map
            .get(id)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(session, _)| session.clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let now = Instant::now();
        map.retain(|_, (_, expires)| *expires > now);
        map.insert(session.id, (session.clone(), now + self.ttl));
        Ok(())
    }

    async fn touch(&self, id: &SessionId) -> Result<bool, SessionStoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let now = Instant::now();
        match map.get_mut(id) {
            Some((_, expires)) if *expires > now => {
                *expires = now + self.ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        map.remove(id);
        Ok(())
    }
}
