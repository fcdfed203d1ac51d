use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// Roles granted within one scope (the realm, or a single client).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl RoleSet {
    pub fn contains(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Access-token claims the gateway relies on.
///
/// Field names follow the OpenID Connect / Keycloak token layout so a decoded
/// token deserializes straight into this struct. Unknown claims are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id within the realm).
    pub sub: String,

    /// Issuer URL; for Keycloak this is `{auth-server-url}/realms/{realm}`.
    pub iss: String,

    /// Expiration, seconds since the epoch.
    pub exp: i64,

    /// Issued-at, seconds since the epoch.
    #[serde(default)]
    pub iat: Option<i64>,

    /// Authorized party (client the token was issued to).
    #[serde(default)]
    pub azp: Option<String>,

    #[serde(default)]
    pub preferred_username: Option<String>,

    #[serde(default)]
    pub realm_access: RoleSet,

    #[serde(default)]
    pub resource_access: BTreeMap<String, RoleSet>,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn has_realm_role(&self, role: &Role) -> bool {
        self.realm_access.contains(role)
    }

    pub fn has_client_role(&self, client: &str, role: &Role) -> bool {
        self.resource_access
            .get(client)
            .is_some_and(|set| set.contains(role))
    }

    /// All roles in display form: realm roles bare, client roles as
    /// `client:role`.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .realm_access
            .roles
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        for (client, set) in &self.resource_access {
            names.extend(set.roles.iter().map(|r| format!("{client}:{r}")));
        }
        names
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("token issued by '{found}', expected '{expected}'")]
    IssuerMismatch { expected: String, found: String },

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("realm signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

impl TokenValidationError {
    /// Only an otherwise-valid token that ran out of time may be refreshed.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

/// Check issuer and time window of already-decoded claims.
///
/// Signature verification happens before this, in the provider.
pub fn validate_claims(
    claims: &AccessClaims,
    expected_issuer: &str,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.iss != expected_issuer {
        return Err(TokenValidationError::IssuerMismatch {
            expected: expected_issuer.to_string(),
            found: claims.iss.clone(),
        });
    }

    let now = now.timestamp();
    if let Some(iat) = claims.iat {
        if now < iat {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ISSUER: &str = "http://localhost:8080/auth/realms/tenantA";

    fn claims(now: DateTime<Utc>, ttl: Duration) -> AccessClaims {
        AccessClaims {
            sub: "u-1".into(),
            iss: ISSUER.into(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            azp: Some("realmgate".into()),
            preferred_username: Some("alice".into()),
            realm_access: RoleSet { roles: vec![Role::new("admin")] },
            resource_access: BTreeMap::from([(
                "realmgate".to_string(),
                RoleSet { roles: vec![Role::new("reader")] },
            )]),
        }
    }

    #[test]
    fn accepts_fresh_token_from_expected_issuer() {
        let now = Utc::now();
        assert_eq!(validate_claims(&claims(now, Duration::minutes(5)), ISSUER, now), Ok(()));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(10), Duration::minutes(5));
        let err = validate_claims(&c, ISSUER, now).unwrap_err();
        assert!(err.is_expired());
    }

    #[test]
    fn foreign_issuer_is_rejected_before_time_checks() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(10), Duration::minutes(5));
        let err = validate_claims(&c, "http://localhost:8080/auth/realms/tenantB", now).unwrap_err();
        assert!(matches!(err, TokenValidationError::IssuerMismatch { .. }));
        assert!(!err.is_expired());
    }

    #[test]
    fn future_issued_at_is_not_yet_valid() {
        let now = Utc::now();
        let c = claims(now + Duration::minutes(1), Duration::minutes(5));
        assert_eq!(validate_claims(&c, ISSUER, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn role_lookup_is_scope_aware() {
        let c = claims(Utc::now(), Duration::minutes(5));
        assert!(c.has_realm_role(&Role::new("admin")));
        assert!(!c.has_realm_role(&Role::new("reader")));
        assert!(c.has_client_role("realmgate", &Role::new("reader")));
        assert!(!c.has_client_role("other", &Role::new("reader")));
        assert_eq!(c.role_names(), vec!["admin".to_string(), "realmgate:reader".to_string()]);
    }

    #[test]
    fn keycloak_token_payload_deserializes() {
        let raw = serde_json::json!({
            "exp": 1_900_000_000,
            "iat": 1_899_999_700,
            "iss": ISSUER,
            "sub": "f1b2",
            "typ": "Bearer",
            "azp": "realmgate",
            "realm_access": { "roles": ["offline_access", "admin"] },
            "resource_access": { "account": { "roles": ["view-profile"] } },
            "preferred_username": "alice"
        });
        let c: AccessClaims = serde_json::from_value(raw).unwrap();
        assert!(c.has_realm_role(&Role::new("admin")));
        assert!(c.has_client_role("account", &Role::new("view-profile")));
    }
}
