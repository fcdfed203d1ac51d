use serde::{Deserialize, Serialize};

use realmgate_auth::Grant;

use crate::context::AuthContext;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token material returned by a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub realm: String,
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl LoginResponse {
    pub fn from_grant(grant: Grant, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            realm: grant.realm.to_string(),
            expires_in: (grant.expires_at - now).num_seconds().max(0),
            refresh_expires_in: grant
                .refresh_expires_at
                .map(|at| (at - now).num_seconds().max(0)),
            access_token: grant.access_token,
            token_type: grant.token_type,
            refresh_token: grant.refresh_token,
            id_token: grant.id_token,
            scope: grant.scope,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub realm: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub roles: Vec<String>,
}

impl From<&AuthContext> for WhoAmIResponse {
    fn from(ctx: &AuthContext) -> Self {
        Self {
            realm: ctx.realm().to_string(),
            subject: ctx.subject().to_string(),
            username: ctx.claims().preferred_username.clone(),
            roles: ctx.claims().role_names(),
        }
    }
}
