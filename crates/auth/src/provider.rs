use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use realmgate_core::RealmName;

use crate::{AccessClaims, Grant, TokenValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered and refused the exchange (bad credentials,
    /// revoked refresh token, disabled client, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Transport(String),

    #[error("malformed identity provider response: {0}")]
    Malformed(String),

    #[error("grant carries no usable refresh token")]
    NoRefreshToken,
}

/// Client for one realm's identity provider.
///
/// Implementations must be cheap to share (`Arc`) and safe to call from many
/// requests at once.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Realm this client is bound to.
    fn realm(&self) -> &RealmName;

    /// Client/resource identifier registered with the provider.
    fn resource(&self) -> &str;

    /// Resource-owner password exchange.
    async fn obtain_directly(&self, username: &str, password: &str) -> Result<Grant, ProviderError>;

    /// Exchange the grant's refresh token for fresh token material.
    async fn refresh(&self, grant: &Grant) -> Result<Grant, ProviderError>;

    /// Verify an access token against this realm's signing keys and issuer.
    async fn verify(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenValidationError>;
}
