//! `realmgate-auth`: realm-scoped authentication and authorization.
//!
//! Identity providers, grants, token claims and route policies. This crate is
//! decoupled from HTTP serving and from session storage.

pub mod claims;
pub mod grant;
pub mod keycloak;
pub mod policy;
pub mod provider;
pub mod registry;
pub mod roles;

pub use claims::{AccessClaims, RoleSet, TokenValidationError, validate_claims};
pub use grant::{Grant, TokenResponse};
pub use keycloak::{ClientCredentials, KeycloakClient, KeycloakConfig, SslRequired};
pub use policy::{AuthzError, Policy, PolicyParseError, authorize};
pub use provider::{IdentityProvider, ProviderError};
pub use registry::{RealmRegistry, RegistryError};
pub use roles::Role;
