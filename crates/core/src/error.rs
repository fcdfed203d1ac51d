//! Gateway error model.

use thiserror::Error;

/// Result type used across the gateway boundary.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boundary-level error.
///
/// Every boundary operation (login, protect, health) converts whatever went
/// wrong internally into exactly one of these variants, so callers branch on
/// the kind instead of inspecting messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Neither the `realm` header nor the `realm` query parameter was present.
    #[error("no realm could be resolved from the request")]
    NoRealm,

    /// The resolved realm has no registered identity provider.
    #[error("unknown realm '{0}'")]
    UnknownRealm(String),

    /// Missing, invalid, foreign or unrefreshable grant.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid grant, but the route policy is not satisfied.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A stateful dependency (cache, relational store) could not be reached.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The identity provider rejected a login or refresh exchange.
    #[error("{0}")]
    ProviderExchangeFailed(String),
}

impl GatewayError {
    pub fn unknown_realm(realm: impl Into<String>) -> Self {
        Self::UnknownRealm(realm.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::DependencyUnavailable(msg.into())
    }

    pub fn exchange_failed(msg: impl Into<String>) -> Self {
        Self::ProviderExchangeFailed(msg.into())
    }

    /// Stable machine-readable discriminator used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoRealm => "no_realm",
            Self::UnknownRealm(_) => "unknown_realm",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::ProviderExchangeFailed(_) => "provider_exchange_failed",
        }
    }
}
