//! Auth gateway: login against a realm, and per-request grant validation.
//!
//! Both entry points resolve the realm's provider through the registry first,
//! so an unknown realm is reported before any session state is consulted.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use realmgate_auth::{AccessClaims, Grant, IdentityProvider, Policy, RealmRegistry, authorize};
use realmgate_core::{GatewayError, GatewayResult, RealmName};
use realmgate_infra::session::SessionHandle;

use crate::context::AuthContext;

pub struct AuthGateway {
    registry: Arc<RealmRegistry>,
}

impl AuthGateway {
    pub fn new(registry: Arc<RealmRegistry>) -> Self {
        Self { registry }
    }

    /// Route guard bound to this gateway. A `None` policy admits any
    /// authenticated caller of the resolved realm.
    pub fn protect(self: &Arc<Self>, policy: Option<Policy>) -> Protect {
        Protect {
            gateway: Arc::clone(self),
            policy: policy.map(Arc::new),
        }
    }

    fn provider(&self, realm: Option<&RealmName>) -> GatewayResult<(RealmName, Arc<dyn IdentityProvider>)> {
        let realm = realm.ok_or(GatewayError::NoRealm)?;
        let provider = self.registry.get(realm)?;
        Ok((realm.clone(), provider))
    }

    /// Resource-owner password login.
    ///
    /// On success the grant replaces whatever the session held and the session
    /// is persisted before returning.
    pub async fn login(
        &self,
        realm: Option<RealmName>,
        username: &str,
        password: &str,
        session: &SessionHandle,
    ) -> GatewayResult<Grant> {
        let (realm, provider) = self.provider(realm.as_ref())?;

        let grant = provider
            .obtain_directly(username, password)
            .await
            .map_err(|e| {
                tracing::warn!(realm = %realm, error = %e, "login rejected");
                GatewayError::exchange_failed(e.to_string())
            })?;

        session.set_grant(grant.clone());
        session.persist().await?;

        tracing::info!(realm = %realm, session = %session.id(), "login succeeded");
        Ok(grant)
    }

    /// Destroy the caller's session.
    pub async fn logout(&self, session: &SessionHandle) -> GatewayResult<()> {
        session.destroy().await?;
        tracing::info!(session = %session.id(), "session destroyed");
        Ok(())
    }

    /// Validate the session grant for `realm` and evaluate `policy`.
    ///
    /// An expired access token triggers at most one refresh exchange; the
    /// refreshed grant is persisted under the same session id before this
    /// returns.
    pub async fn authenticate(
        &self,
        realm: Option<RealmName>,
        session: &SessionHandle,
        policy: Option<&Policy>,
    ) -> GatewayResult<AuthContext> {
        let (realm, provider) = self.provider(realm.as_ref())?;

        let grant = session
            .grant()
            .ok_or_else(|| GatewayError::unauthenticated("no grant in session"))?;

        // Never hand a foreign realm's token to this realm's provider.
        if !grant.is_issued_by(&realm) {
            tracing::warn!(realm = %realm, grant_realm = %grant.realm, "cross-realm grant refused");
            return Err(GatewayError::unauthenticated(format!(
                "session grant was issued by realm '{}'",
                grant.realm
            )));
        }

        let now = Utc::now();
        let verified = provider.verify(&grant.access_token, now).await;
        let (grant, claims) = match verified {
            Ok(claims) => (grant, claims),
            Err(e) if e.is_expired() => refresh(provider.as_ref(), &grant, session, now).await?,
            Err(e) => {
                tracing::warn!(realm = %realm, error = %e, "grant rejected");
                return Err(GatewayError::unauthenticated(e.to_string()));
            }
        };

        authorize(policy, &claims, provider.resource()).map_err(|e| {
            tracing::warn!(realm = %realm, sub = %claims.sub, error = %e, "policy not satisfied");
            GatewayError::forbidden(e.to_string())
        })?;

        Ok(AuthContext::new(realm, grant, claims))
    }
}

async fn refresh(
    provider: &dyn IdentityProvider,
    grant: &Grant,
    session: &SessionHandle,
    now: DateTime<Utc>,
) -> GatewayResult<(Grant, AccessClaims)> {
    if !grant.can_refresh(now) {
        return Err(GatewayError::unauthenticated("access token expired"));
    }

    let refreshed = provider.refresh(grant).await.map_err(|e| {
        tracing::warn!(realm = %grant.realm, error = %e, "token refresh failed");
        GatewayError::unauthenticated(format!("token refresh failed: {e}"))
    })?;
    let claims = provider
        .verify(&refreshed.access_token, Utc::now())
        .await
        .map_err(|e| GatewayError::unauthenticated(e.to_string()))?;

    session.set_grant(refreshed.clone());
    session.persist().await?;

    tracing::info!(realm = %refreshed.realm, session = %session.id(), "grant refreshed");
    Ok((refreshed, claims))
}

/// Per-route guard state: gateway plus the route's parsed policy.
#[derive(Clone)]
pub struct Protect {
    gateway: Arc<AuthGateway>,
    policy: Option<Arc<Policy>>,
}

impl Protect {
    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_deref()
    }

    pub async fn check(&self, realm: Option<RealmName>, session: &SessionHandle) -> GatewayResult<AuthContext> {
        self.gateway.authenticate(realm, session, self.policy()).await
    }
}
