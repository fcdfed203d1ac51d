use realmgate_auth::{AccessClaims, Grant};
use realmgate_core::RealmName;

/// Realm resolved for the current request.
///
/// Re-resolved on every request; never cached per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmContext {
    realm: RealmName,
}

impl RealmContext {
    pub fn new(realm: RealmName) -> Self {
        Self { realm }
    }

    pub fn realm(&self) -> &RealmName {
        &self.realm
    }
}

/// Authenticated caller for a protected request (validated grant + claims).
#[derive(Debug, Clone)]
pub struct AuthContext {
    realm: RealmName,
    grant: Grant,
    claims: AccessClaims,
}

impl AuthContext {
    pub fn new(realm: RealmName, grant: Grant, claims: AccessClaims) -> Self {
        Self { realm, grant, claims }
    }

    pub fn realm(&self) -> &RealmName {
        &self.realm
    }

    pub fn grant(&self) -> &Grant {
        &self.grant
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}
