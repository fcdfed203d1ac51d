use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use realmgate_auth::Grant;
use realmgate_core::SessionId;

use super::{Session, SessionStore, SessionStoreError};

/// What happened to the session at the end of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Record written (new, or modified and not yet persisted).
    Saved,
    /// TTL refreshed only.
    Touched,
    /// New, untouched session that was not worth storing.
    Skipped,
    /// Session was destroyed during the request.
    Destroyed,
}

impl CommitOutcome {
    /// Whether the caller should (re)send the session cookie.
    pub fn keeps_cookie(&self) -> bool {
        matches!(self, Self::Saved | Self::Touched)
    }
}

struct State {
    session: Session,
    dirty: bool,
    /// Written to the store at least once during this request.
    saved: bool,
    destroyed: bool,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    is_new: bool,
    state: Mutex<State>,
}

/// Request-scoped view of one session.
///
/// Cheap to clone; every clone refers to the same in-flight session. Writes go
/// to the store only through `persist`, `destroy` or `commit`.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    /// Load the session named by the cookie, or start a fresh anonymous one.
    ///
    /// A store failure does not fail the request: it is logged and the caller
    /// continues with a fresh session.
    pub async fn load_or_create(store: Arc<dyn SessionStore>, id: Option<SessionId>) -> Self {
        let loaded = match id {
            None => None,
            Some(id) => match store.load(&id).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(error = %e, "session load failed; starting a fresh session");
                    None
                }
            },
        };

        let (session, is_new) = match loaded {
            Some(session) => (session, false),
            None => (Session::new(Utc::now()), true),
        };

        Self {
            inner: Arc::new(Inner {
                store,
                is_new,
                state: Mutex::new(State {
                    session,
                    dirty: false,
                    saved: false,
                    destroyed: false,
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> SessionId {
        self.state().session.id
    }

    pub fn is_new(&self) -> bool {
        self.inner.is_new
    }

    pub fn grant(&self) -> Option<Grant> {
        self.state().session.grant().cloned()
    }

    /// Replace the stored grant in place (same session id). Not persisted
    /// until `persist` or `commit`.
    pub fn set_grant(&self, grant: Grant) {
        let mut state = self.state();
        state.session.authenticate(grant);
        state.session.last_access = Utc::now();
        state.dirty = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    /// Write the current session to the store now.
    pub async fn persist(&self) -> Result<(), SessionStoreError> {
        let session = {
            let mut state = self.state();
            state.session.last_access = Utc::now();
            state.session.clone()
        };
        self.inner.store.save(&session).await?;
        let mut state = self.state();
        state.dirty = false;
        state.saved = true;
        Ok(())
    }

    /// Remove the session from the store; later commits are no-ops.
    pub async fn destroy(&self) -> Result<(), SessionStoreError> {
        let id = {
            let mut state = self.state();
            state.destroyed = true;
            state.session.id
        };
        self.inner.store.destroy(&id).await
    }

    /// End-of-request bookkeeping: save unsaved changes, otherwise refresh the
    /// TTL so an active session does not expire.
    pub async fn commit(&self, save_uninitialized: bool) -> Result<CommitOutcome, SessionStoreError> {
        let (destroyed, dirty, saved) = {
            let state = self.state();
            (state.destroyed, state.dirty, state.saved)
        };

        if destroyed {
            return Ok(CommitOutcome::Destroyed);
        }
        if dirty || (self.inner.is_new && save_uninitialized && !saved) {
            self.persist().await?;
            return Ok(CommitOutcome::Saved);
        }
        if saved {
            return Ok(CommitOutcome::Saved);
        }
        if self.inner.is_new {
            return Ok(CommitOutcome::Skipped);
        }

        if self.inner.store.touch(&self.id()).await? {
            Ok(CommitOutcome::Touched)
        } else {
            // Expired between load and commit; write it back.
            self.persist().await?;
            Ok(CommitOutcome::Saved)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::{InMemorySessionStore, testing};

    fn store() -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn unknown_cookie_starts_fresh_session() {
        let store = store();
        let handle = SessionHandle::load_or_create(store.clone(), Some(SessionId::new())).await;
        assert!(handle.is_new());
        assert!(handle.grant().is_none());
    }

    #[tokio::test]
    async fn grant_survives_round_trip_through_store() {
        let store = store();
        let first = SessionHandle::load_or_create(store.clone(), None).await;
        first.set_grant(testing::grant("tenantA", "at-1"));
        assert_eq!(first.commit(false).await.unwrap(), CommitOutcome::Saved);

        let second = SessionHandle::load_or_create(store.clone(), Some(first.id())).await;
        assert!(!second.is_new());
        assert_eq!(second.grant().unwrap().access_token, "at-1");
        assert_eq!(second.commit(false).await.unwrap(), CommitOutcome::Touched);
    }

    #[tokio::test]
    async fn refresh_overwrites_in_place() {
        let store = store();
        let handle = SessionHandle::load_or_create(store.clone(), None).await;
        handle.set_grant(testing::grant("tenantA", "old"));
        handle.persist().await.unwrap();
        let id = handle.id();

        handle.set_grant(testing::grant("tenantA", "new"));
        handle.persist().await.unwrap();

        assert_eq!(handle.id(), id);
        let stored = store.load(&id).await.unwrap().unwrap();
        assert_eq!(stored.grant().unwrap().access_token, "new");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn untouched_new_session_respects_save_uninitialized() {
        let store = store();
        let skipped = SessionHandle::load_or_create(store.clone(), None).await;
        assert_eq!(skipped.commit(false).await.unwrap(), CommitOutcome::Skipped);
        assert!(store.is_empty());

        let saved = SessionHandle::load_or_create(store.clone(), None).await;
        assert_eq!(saved.commit(true).await.unwrap(), CommitOutcome::Saved);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn session_persisted_mid_request_keeps_its_cookie() {
        let store = store();
        let handle = SessionHandle::load_or_create(store.clone(), None).await;
        handle.set_grant(testing::grant("tenantA", "at"));
        handle.persist().await.unwrap();

        let outcome = handle.commit(false).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Saved);
        assert!(outcome.keeps_cookie());
    }

    #[tokio::test]
    async fn destroyed_session_is_not_resurrected_by_commit() {
        let store = store();
        let handle = SessionHandle::load_or_create(store.clone(), None).await;
        handle.set_grant(testing::grant("tenantA", "at"));
        handle.persist().await.unwrap();

        handle.destroy().await.unwrap();
        assert_eq!(handle.commit(true).await.unwrap(), CommitOutcome::Destroyed);
        assert!(store.load(&handle.id()).await.unwrap().is_none());
    }
}
