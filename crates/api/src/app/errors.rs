use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use realmgate_core::GatewayError;

pub fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::NoRealm => StatusCode::BAD_REQUEST,
        GatewayError::UnknownRealm(_) => StatusCode::UNAUTHORIZED,
        GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
        GatewayError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        // Upstream rejection of the caller's credentials or refresh token.
        GatewayError::ProviderExchangeFailed(_) => StatusCode::UNAUTHORIZED,
    }
}

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    json_error(status_for(&err), err.kind(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    kind: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": {
                "kind": kind,
                "message": message.into(),
            }
        })),
    )
        .into_response()
}
