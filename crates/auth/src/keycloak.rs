//! Keycloak-compatible identity provider client.
//!
//! One `KeycloakClient` serves exactly one realm. Token exchange goes through
//! the realm's OpenID Connect token endpoint; access tokens are verified
//! locally against either a configured realm public key or the realm's JWKS.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use realmgate_core::RealmName;

use crate::{
    AccessClaims, Grant, IdentityProvider, ProviderError, TokenResponse, TokenValidationError,
    validate_claims,
};

/// When the provider URL must use TLS (Keycloak `ssl-required`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslRequired {
    /// Every provider URL must be https.
    All,
    /// Plain http is tolerated only for loopback/private addresses.
    #[default]
    External,
    None,
}

impl SslRequired {
    /// Check a provider base URL against this requirement.
    pub fn check(&self, url: &str) -> Result<(), String> {
        let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid url '{url}': {e}"))?;
        if parsed.scheme() == "https" {
            return Ok(());
        }

        match self {
            Self::None => Ok(()),
            Self::All => Err(format!("ssl-required=all but '{url}' is not https")),
            Self::External => {
                let host = parsed.host_str().unwrap_or_default();
                if is_local_host(host) {
                    Ok(())
                } else {
                    Err(format!("ssl-required=external but '{url}' is neither https nor local"))
                }
            }
        }
    }
}

fn is_local_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => ip.is_loopback() || ip.is_private() || ip.is_link_local(),
        Ok(IpAddr::V6(ip)) => ip.is_loopback(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub secret: String,
}

/// Per-realm provider configuration.
///
/// At startup a single template is cloned for every configured realm; only the
/// realm name differs between the clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeycloakConfig {
    pub auth_server_url: String,

    #[serde(default)]
    pub ssl_required: SslRequired,

    /// Client id registered in every realm.
    pub resource: String,

    /// Base64 DER (SPKI) realm key, as shown in the Keycloak admin console.
    /// When absent the realm JWKS is fetched on first use.
    #[serde(default)]
    pub realm_public_key: Option<String>,

    #[serde(default)]
    pub credentials: Option<ClientCredentials>,

    /// Transport timeout for every provider call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            auth_server_url: "http://localhost:8080/auth".to_string(),
            ssl_required: SslRequired::External,
            resource: "realmgate".to_string(),
            realm_public_key: None,
            credentials: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl KeycloakConfig {
    pub fn realm_url(&self, realm: &RealmName) -> String {
        format!("{}/realms/{}", self.auth_server_url.trim_end_matches('/'), realm)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

enum KeySource {
    Static(DecodingKey),
    Jwks {
        url: String,
        cached: RwLock<Option<JwkSet>>,
    },
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Identity provider client bound to one Keycloak realm.
pub struct KeycloakClient {
    realm: RealmName,
    resource: String,
    client_secret: Option<String>,
    issuer: String,
    token_url: String,
    http: reqwest::Client,
    keys: KeySource,
}

impl KeycloakClient {
    pub fn new(
        realm: RealmName,
        config: &KeycloakConfig,
        http: reqwest::Client,
    ) -> Result<Self, String> {
        config.ssl_required.check(&config.auth_server_url)?;

        let issuer = config.realm_url(&realm);
        let keys = match &config.realm_public_key {
            Some(key) => {
                let pem = format!(
                    "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
                    key.trim()
                );
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| format!("invalid realm-public-key: {e}"))?;
                KeySource::Static(key)
            }
            None => KeySource::Jwks {
                url: format!("{issuer}/protocol/openid-connect/certs"),
                cached: RwLock::new(None),
            },
        };

        Ok(Self {
            token_url: format!("{issuer}/protocol/openid-connect/token"),
            realm,
            resource: config.resource.clone(),
            client_secret: config.credentials.as_ref().map(|c| c.secret.clone()),
            issuer,
            http,
            keys,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn exchange(&self, params: &[(&str, &str)]) -> Result<Grant, ProviderError> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_id", self.resource.as_str()));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let res = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body: Option<OAuthErrorBody> = res.json().await.ok();
            let message = body
                .and_then(|b| b.error_description.or(b.error))
                .unwrap_or_else(|| format!("token endpoint returned {status}"));
            return Err(ProviderError::Rejected(message));
        }

        let tokens: TokenResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(Grant::from_token_response(self.realm.clone(), tokens, Utc::now()))
    }

    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, TokenValidationError> {
        let (url, cached) = match &self.keys {
            KeySource::Static(key) => return Ok(key.clone()),
            KeySource::Jwks { url, cached } => (url, cached),
        };
        let kid = kid.ok_or_else(|| TokenValidationError::Malformed("token header has no kid".into()))?;

        if let Some(set) = cached.read().await.as_ref() {
            if let Some(jwk) = set.find(kid) {
                return DecodingKey::from_jwk(jwk)
                    .map_err(|e| TokenValidationError::KeysUnavailable(e.to_string()));
            }
        }

        // Unknown kid: the realm may have rotated keys since the last fetch.
        tracing::debug!(realm = %self.realm, kid, "fetching realm signing keys");
        let set: JwkSet = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TokenValidationError::KeysUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| TokenValidationError::KeysUnavailable(e.to_string()))?;

        let key = set
            .find(kid)
            .ok_or(TokenValidationError::InvalidSignature)
            .and_then(|jwk| {
                DecodingKey::from_jwk(jwk)
                    .map_err(|e| TokenValidationError::KeysUnavailable(e.to_string()))
            });
        *cached.write().await = Some(set);
        key
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenValidationError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            TokenValidationError::InvalidSignature
        }
        ErrorKind::ExpiredSignature => TokenValidationError::Expired,
        ErrorKind::ImmatureSignature => TokenValidationError::NotYetValid,
        _ => TokenValidationError::Malformed(err.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    fn realm(&self) -> &RealmName {
        &self.realm
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    async fn obtain_directly(&self, username: &str, password: &str) -> Result<Grant, ProviderError> {
        self.exchange(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", "openid"),
        ])
        .await
    }

    async fn refresh(&self, grant: &Grant) -> Result<Grant, ProviderError> {
        let token = grant
            .refresh_token
            .as_deref()
            .ok_or(ProviderError::NoRefreshToken)?;
        self.exchange(&[("grant_type", "refresh_token"), ("refresh_token", token)])
            .await
    }

    async fn verify(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenValidationError> {
        let header = decode_header(access_token).map_err(map_jwt_error)?;
        if !matches!(
            header.alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
                | Algorithm::ES256
                | Algorithm::ES384
        ) {
            return Err(TokenValidationError::InvalidSignature);
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        // Time window and issuer are checked by `validate_claims` against the
        // caller-supplied clock.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<AccessClaims>(access_token, &key, &validation).map_err(map_jwt_error)?;
        validate_claims(&data.claims, &self.issuer, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str, ssl: SslRequired) -> KeycloakConfig {
        KeycloakConfig {
            auth_server_url: url.into(),
            ssl_required: ssl,
            resource: "realmgate".into(),
            realm_public_key: None,
            credentials: None,
            timeout_ms: default_timeout_ms(),
        }
    }

    #[test]
    fn external_ssl_allows_local_plain_http_only() {
        assert!(SslRequired::External.check("http://localhost:8080/auth").is_ok());
        assert!(SslRequired::External.check("http://127.0.0.1:8080/auth").is_ok());
        assert!(SslRequired::External.check("http://10.1.2.3/auth").is_ok());
        assert!(SslRequired::External.check("http://[::1]:8080/auth").is_ok());
        assert!(SslRequired::External.check("http://sso.example.com/auth").is_err());
        assert!(SslRequired::External.check("https://sso.example.com/auth").is_ok());
    }

    #[test]
    fn all_ssl_requires_https_everywhere() {
        assert!(SslRequired::All.check("http://localhost:8080/auth").is_err());
        assert!(SslRequired::All.check("https://localhost:8443/auth").is_ok());
        assert!(SslRequired::None.check("http://sso.example.com/auth").is_ok());
    }

    #[test]
    fn template_is_bound_to_realm_urls() {
        let cfg = config("http://localhost:8080/auth/", SslRequired::External);
        let client = KeycloakClient::new(
            RealmName::parse("tenantA").unwrap(),
            &cfg,
            reqwest::Client::new(),
        )
        .unwrap();

        assert_eq!(client.issuer(), "http://localhost:8080/auth/realms/tenantA");
        assert_eq!(
            client.token_url,
            "http://localhost:8080/auth/realms/tenantA/protocol/openid-connect/token"
        );
        assert_eq!(client.resource(), "realmgate");
    }

    #[test]
    fn construction_fails_when_tls_requirement_is_violated() {
        let cfg = config("http://sso.example.com/auth", SslRequired::External);
        let res = KeycloakClient::new(RealmName::parse("tenantA").unwrap(), &cfg, reqwest::Client::new());
        assert!(res.is_err());
    }

    #[test]
    fn kebab_case_template_deserializes() {
        let cfg: KeycloakConfig = serde_json::from_value(serde_json::json!({
            "auth-server-url": "http://localhost:8080/auth",
            "ssl-required": "external",
            "resource": "elaraone"
        }))
        .unwrap();
        assert_eq!(cfg.ssl_required, SslRequired::External);
        assert_eq!(cfg.timeout(), Duration::from_millis(5_000));
        assert!(cfg.realm_public_key.is_none());
    }

    #[tokio::test]
    async fn garbage_tokens_are_malformed_not_panics() {
        let cfg = config("http://localhost:8080/auth", SslRequired::External);
        let client = KeycloakClient::new(RealmName::parse("tenantA").unwrap(), &cfg, reqwest::Client::new())
            .unwrap();
        let err = client.verify("not-a-jwt", Utc::now()).await.unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }
}
