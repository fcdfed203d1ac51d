//! Server-side sessions.
//!
//! A session is keyed by an opaque [`SessionId`] (delivered to the caller as a
//! cookie) and lives in a [`SessionStore`] with a rolling TTL. Its payload is
//! either anonymous or holds exactly one grant; the grant remembers the realm
//! that issued it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use realmgate_auth::Grant;
use realmgate_core::{RealmName, SessionId};

mod handle;
#[cfg(feature = "redis")]
mod redis_store;
mod store;

pub use handle::{CommitOutcome, SessionHandle};
#[cfg(feature = "redis")]
pub use redis_store::RedisSessionStore;
pub use store::{InMemorySessionStore, SessionStore, SessionStoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionPayload {
    Anonymous,
    Authenticated { grant: Grant },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    /// Time of the last write to this session.
    pub last_access: DateTime<Utc>,
    pub payload: SessionPayload,
}

impl Session {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            created_at: now,
            last_access: now,
            payload: SessionPayload::Anonymous,
        }
    }

    pub fn grant(&self) -> Option<&Grant> {
        match &self.payload {
            SessionPayload::Anonymous => None,
            SessionPayload::Authenticated { grant } => Some(grant),
        }
    }

    pub fn realm(&self) -> Option<&RealmName> {
        self.grant().map(|g| &g.realm)
    }

    /// Store (or replace) the grant. The previous grant, if any, is dropped
    /// regardless of which realm issued it.
    pub fn authenticate(&mut self, grant: Grant) {
        self.payload = SessionPayload::Authenticated { grant };
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.payload, SessionPayload::Authenticated { .. })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};

    use realmgate_auth::Grant;
    use realmgate_core::RealmName;

    pub fn grant(realm: &str, access_token: &str) -> Grant {
        Grant {
            realm: RealmName::parse(realm).unwrap(),
            access_token: access_token.to_string(),
            refresh_token: Some(format!("{access_token}-refresh")),
            id_token: None,
            token_type: "Bearer".to_string(),
            expires_at: Utc::now() + Duration::minutes(5),
            refresh_expires_at: None,
            scope: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_sessions_are_anonymous() {
        let s = Session::new(Utc::now());
        assert!(!s.is_authenticated());
        assert!(s.grant().is_none());
        assert!(s.realm().is_none());
    }

    #[test]
    fn authenticating_replaces_previous_grant() {
        let mut s = Session::new(Utc::now());
        s.authenticate(testing::grant("tenantA", "a"));
        s.authenticate(testing::grant("tenantB", "b"));
        assert_eq!(s.realm().unwrap().as_str(), "tenantB");
        assert_eq!(s.grant().unwrap().access_token, "b");
    }

    #[test]
    fn payload_is_tagged_in_json() {
        let mut s = Session::new(Utc::now());
        let anon = serde_json::to_value(&s).unwrap();
        assert_eq!(anon["payload"]["kind"], "anonymous");

        s.authenticate(testing::grant("tenantA", "a"));
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(serde_json::to_value(&back).unwrap()["payload"]["kind"], "authenticated");
    }

    proptest! {
        #[test]
        fn stored_sessions_survive_the_json_codec(
            realm in "[A-Za-z][A-Za-z0-9_-]{0,15}",
            token in "[!-~]{1,64}",
            keep_refresh in any::<bool>(),
        ) {
            let mut grant = testing::grant(&realm, &token);
            if !keep_refresh {
                grant.refresh_token = None;
            }
            let mut s = Session::new(Utc::now());
            s.authenticate(grant);

            let back: Session = serde_json::from_slice(&serde_json::to_vec(&s).unwrap()).unwrap();
            prop_assert_eq!(back.realm().map(RealmName::as_str), Some(realm.as_str()));
            prop_assert_eq!(&back, &s);
        }
    }
}
