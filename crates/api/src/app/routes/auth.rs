use std::sync::Arc;

use axum::{
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use realmgate_infra::session::SessionHandle;

use crate::app::dto::{LoginRequest, LoginResponse};
use crate::app::errors::{gateway_error_to_response, json_error};
use crate::gateway::AuthGateway;
use crate::realm;

/// Direct credential exchange with the realm named by the request.
pub async fn login(
    Extension(gateway): Extension<Arc<AuthGateway>>,
    Extension(session): Extension<SessionHandle>,
    headers: HeaderMap,
    uri: Uri,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text());
        }
    };
    let realm = realm::resolve(&headers, &uri);

    match gateway.login(realm, &body.username, &body.password, &session).await {
        Ok(grant) => (StatusCode::OK, Json(LoginResponse::from_grant(grant, Utc::now()))).into_response(),
        Err(e) => gateway_error_to_response(e),
    }
}

pub async fn logout(
    Extension(gateway): Extension<Arc<AuthGateway>>,
    Extension(session): Extension<SessionHandle>,
) -> axum::response::Response {
    match gateway.logout(&session).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => gateway_error_to_response(e),
    }
}
