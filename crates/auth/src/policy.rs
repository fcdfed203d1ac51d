//! Route policies and their evaluation against validated claims.

use core::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{AccessClaims, Role};

/// Declarative requirement attached to a protected route.
///
/// Textual form follows Keycloak role specs:
/// - `realm:<role>` requires a realm role,
/// - `<client>:<role>` requires a role of another client,
/// - `<role>` requires a role of the realm's own client (its `resource`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Policy {
    RealmRole(Role),
    ClientRole { client: String, role: Role },
    OwnClientRole(Role),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyParseError {
    #[error("policy must not be empty")]
    Empty,

    #[error("malformed policy '{0}': expected '<role>', 'realm:<role>' or '<client>:<role>'")]
    Malformed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("missing required role '{0}'")]
    Forbidden(String),
}

impl Policy {
    pub fn realm_role(role: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        Self::RealmRole(Role::new(role))
    }

    pub fn parse(raw: &str) -> Result<Self, PolicyParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PolicyParseError::Empty);
        }

        match raw.split_once(':') {
            None => Ok(Self::OwnClientRole(Role::new(raw.to_string()))),
            Some((scope, role)) => {
                if scope.is_empty() || role.is_empty() || role.contains(':') {
                    return Err(PolicyParseError::Malformed(raw.to_string()));
                }
                let role = Role::new(role.to_string());
                if scope == "realm" {
                    Ok(Self::RealmRole(role))
                } else {
                    Ok(Self::ClientRole {
                        client: scope.to_string(),
                        role,
                    })
                }
            }
        }
    }

    /// Whether `claims` satisfy this policy; `resource` is the client id of the
    /// realm that validated the token.
    pub fn is_satisfied_by(&self, claims: &AccessClaims, resource: &str) -> bool {
        match self {
            Self::RealmRole(role) => claims.has_realm_role(role),
            Self::ClientRole { client, role } => claims.has_client_role(client, role),
            Self::OwnClientRole(role) => claims.has_client_role(resource, role),
        }
    }
}

impl FromStr for Policy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RealmRole(role) => write!(f, "realm:{role}"),
            Self::ClientRole { client, role } => write!(f, "{client}:{role}"),
            Self::OwnClientRole(role) => write!(f, "{role}"),
        }
    }
}

impl Serialize for Policy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Authorize validated claims against an optional policy.
///
/// - No IO
/// - No panics
/// - A missing policy means "any authenticated caller"
pub fn authorize(
    policy: Option<&Policy>,
    claims: &AccessClaims,
    resource: &str,
) -> Result<(), AuthzError> {
    match policy {
        None => Ok(()),
        Some(p) if p.is_satisfied_by(claims, resource) => Ok(()),
        Some(p) => Err(AuthzError::Forbidden(p.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::RoleSet;

    fn claims(realm_roles: &[&'static str], client_roles: &[(&str, &'static str)]) -> AccessClaims {
        let mut resource_access: BTreeMap<String, RoleSet> = BTreeMap::new();
        for (client, role) in client_roles {
            resource_access
                .entry(client.to_string())
                .or_default()
                .roles
                .push(Role::new(*role));
        }
        AccessClaims {
            sub: "u-1".into(),
            iss: "iss".into(),
            exp: 0,
            iat: None,
            azp: None,
            preferred_username: None,
            realm_access: RoleSet {
                roles: realm_roles.iter().map(|r| Role::new(*r)).collect(),
            },
            resource_access,
        }
    }

    #[test]
    fn parses_all_policy_forms() {
        assert_eq!(Policy::parse("realm:admin").unwrap(), Policy::realm_role("admin"));
        assert_eq!(
            Policy::parse("reports:viewer").unwrap(),
            Policy::ClientRole { client: "reports".into(), role: Role::new("viewer") }
        );
        assert_eq!(Policy::parse("editor").unwrap(), Policy::OwnClientRole(Role::new("editor")));
    }

    #[test]
    fn rejects_malformed_policies() {
        assert_eq!(Policy::parse("  "), Err(PolicyParseError::Empty));
        assert!(matches!(Policy::parse("realm:"), Err(PolicyParseError::Malformed(_))));
        assert!(matches!(Policy::parse(":admin"), Err(PolicyParseError::Malformed(_))));
        assert!(matches!(Policy::parse("a:b:c"), Err(PolicyParseError::Malformed(_))));
    }

    #[test]
    fn display_round_trips() {
        for raw in ["realm:admin", "reports:viewer", "editor"] {
            assert_eq!(Policy::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn realm_role_is_not_satisfied_by_client_role_of_same_name() {
        let c = claims(&[], &[("realmgate", "admin")]);
        let policy = Policy::realm_role("admin");
        assert_eq!(
            authorize(Some(&policy), &c, "realmgate"),
            Err(AuthzError::Forbidden("realm:admin".into()))
        );
    }

    #[test]
    fn own_client_role_uses_the_realm_resource() {
        let c = claims(&[], &[("realmgate", "editor")]);
        let policy = Policy::parse("editor").unwrap();
        assert!(authorize(Some(&policy), &c, "realmgate").is_ok());
        assert!(authorize(Some(&policy), &c, "other-client").is_err());
    }

    #[test]
    fn no_policy_allows_any_validated_caller() {
        assert!(authorize(None, &claims(&[], &[]), "realmgate").is_ok());
    }
}
