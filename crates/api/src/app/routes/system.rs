use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value as JsonValue;

use realmgate_infra::AppConfig;
use realmgate_infra::health::HealthAggregator;

use crate::app::dto::WhoAmIResponse;
use crate::app::errors::json_error;
use crate::context::AuthContext;

const REDACTED: &str = "********";
const SECRET_POINTERS: [&str; 2] = ["/db/password", "/auth/keycloak/credentials/secret"];

pub async fn root() -> &'static str {
    "UP"
}

/// Always 200; dependency failures are reported in the body.
pub async fn healthcheck(Extension(health): Extension<Arc<HealthAggregator>>) -> impl IntoResponse {
    Json(health.check().await)
}

pub async fn whoami(Extension(auth): Extension<AuthContext>) -> impl IntoResponse {
    Json(WhoAmIResponse::from(&auth))
}

/// Static configuration, with credentials masked.
pub async fn config(Extension(config): Extension<Arc<AppConfig>>) -> axum::response::Response {
    match redacted(&config) {
        Ok(body) => Json(body).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}

fn redacted(config: &AppConfig) -> Result<JsonValue, serde_json::Error> {
    let mut value = serde_json::to_value(config)?;
    for pointer in SECRET_POINTERS {
        if let Some(secret) = value.pointer_mut(pointer) {
            *secret = JsonValue::String(REDACTED.to_string());
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use realmgate_auth::ClientCredentials;

    use super::*;

    #[test]
    fn secrets_are_masked() {
        let mut cfg = AppConfig::default();
        cfg.db.password = "hunter2".into();
        cfg.auth.keycloak.credentials = Some(ClientCredentials { secret: "s3cret".into() });

        let body = redacted(&cfg).unwrap();
        assert_eq!(body["db"]["password"], REDACTED);
        assert_eq!(body["auth"]["keycloak"]["credentials"]["secret"], REDACTED);
        assert_eq!(body["http"]["port"], 11010);
        assert!(!body.to_string().contains("hunter2"));
    }
}
