//! Realm registry: one identity provider client per configured realm.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use realmgate_core::{GatewayError, GatewayResult, RealmName};

use crate::{IdentityProvider, KeycloakClient, KeycloakConfig};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no realms configured")]
    Empty,

    #[error("invalid realm name '{0}'")]
    InvalidRealm(String),

    #[error("realm '{0}' configured twice")]
    Duplicate(String),

    #[error("realm '{realm}': {reason}")]
    Provider { realm: String, reason: String },

    #[error("failed to build http client: {0}")]
    Http(String),
}

/// Immutable map from realm name to provider client.
///
/// Built once at startup and shared behind an `Arc`; lookups never mutate, so
/// any number of requests can read concurrently without locking.
pub struct RealmRegistry {
    realms: BTreeMap<RealmName, Arc<dyn IdentityProvider>>,
}

impl RealmRegistry {
    /// Register already-built providers, keyed by the realm each is bound to.
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn IdentityProvider>>,
    ) -> Result<Self, RegistryError> {
        let mut realms = BTreeMap::new();
        for provider in providers {
            let name = provider.realm().clone();
            if realms.insert(name.clone(), provider).is_some() {
                return Err(RegistryError::Duplicate(name.to_string()));
            }
        }
        if realms.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self { realms })
    }

    /// Clone the keycloak template once per realm name.
    ///
    /// All clients share one HTTP connection pool.
    pub fn from_keycloak_template(
        template: &KeycloakConfig,
        realm_names: &[String],
    ) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(template.timeout())
            .build()
            .map_err(|e| RegistryError::Http(e.to_string()))?;

        let mut providers: Vec<Arc<dyn IdentityProvider>> = Vec::with_capacity(realm_names.len());
        for raw in realm_names {
            let realm = RealmName::parse(raw).ok_or_else(|| RegistryError::InvalidRealm(raw.clone()))?;
            let client = KeycloakClient::new(realm.clone(), template, http.clone()).map_err(|reason| {
                RegistryError::Provider {
                    realm: realm.to_string(),
                    reason,
                }
            })?;
            tracing::info!(realm = %realm, issuer = client.issuer(), "registered realm");
            providers.push(Arc::new(client));
        }

        Self::from_providers(providers)
    }

    /// Look up a realm; unknown names become `UnknownRealm`.
    pub fn get(&self, realm: &RealmName) -> GatewayResult<Arc<dyn IdentityProvider>> {
        self.realms
            .get(realm)
            .cloned()
            .ok_or_else(|| GatewayError::unknown_realm(realm.as_str()))
    }
}
