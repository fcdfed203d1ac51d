use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use realmgate_core::RealmName;

/// Raw token endpoint response (OAuth 2.0 / OIDC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token bundle obtained from one realm's identity provider.
///
/// A grant always remembers the realm that issued it; it must never be
/// validated against another realm's provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub realm: RealmName,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Grant {
    /// Build a grant from a token endpoint response received at `now`.
    ///
    /// Keycloak reports `refresh_expires_in = 0` for offline tokens, which
    /// means "no fixed expiry".
    pub fn from_token_response(realm: RealmName, resp: TokenResponse, now: DateTime<Utc>) -> Self {
        let refresh_expires_at = match (&resp.refresh_token, resp.refresh_expires_in) {
            (Some(_), Some(secs)) if secs > 0 => Some(now + Duration::seconds(secs)),
            _ => None,
        };

        Self {
            realm,
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            id_token: resp.id_token,
            token_type: resp.token_type,
            expires_at: now + Duration::seconds(resp.expires_in.max(0)),
            refresh_expires_at,
            scope: resp.scope,
        }
    }

    pub fn is_issued_by(&self, realm: &RealmName) -> bool {
        &self.realm == realm
    }

    /// Whether a refresh exchange is worth attempting at `now`.
    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_expires_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(at)) => now < at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(refresh_expires_in: Option<i64>) -> TokenResponse {
        serde_json::from_value(serde_json::json!({
            "access_token": "at",
            "expires_in": 300,
            "refresh_token": "rt",
            "refresh_expires_in": refresh_expires_in,
            "token_type": "Bearer",
            "scope": "profile email"
        }))
        .unwrap()
    }

    #[test]
    fn expiry_is_anchored_at_receive_time() {
        let now = Utc::now();
        let realm = RealmName::parse("tenantA").unwrap();
        let grant = Grant::from_token_response(realm.clone(), response(Some(1800)), now);

        assert!(grant.is_issued_by(&realm));
        assert_eq!(grant.expires_at, now + Duration::seconds(300));
        assert_eq!(grant.refresh_expires_at, Some(now + Duration::seconds(1800)));
        assert!(grant.can_refresh(now));
        assert!(!grant.can_refresh(now + Duration::seconds(1800)));
    }

    #[test]
    fn offline_refresh_token_never_expires() {
        let now = Utc::now();
        let grant = Grant::from_token_response(
            RealmName::parse("tenantA").unwrap(),
            response(Some(0)),
            now,
        );
        assert_eq!(grant.refresh_expires_at, None);
        assert!(grant.can_refresh(now + Duration::days(365)));
    }

    #[test]
    fn grant_without_refresh_token_cannot_refresh() {
        let now = Utc::now();
        let mut resp = response(None);
        resp.refresh_token = None;
        let grant = Grant::from_token_response(RealmName::parse("tenantA").unwrap(), resp, now);
        assert!(!grant.can_refresh(now));
    }
}
