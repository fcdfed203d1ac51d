//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: registry, session store and health probes built from config
//! - `routes/`: handlers (auth and system endpoints)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: `GatewayError` to JSON error responses

use axum::{
    Extension, Router,
    http::{HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use realmgate_auth::Policy;
use realmgate_infra::config::CorsConfig;

use crate::gateway::AuthGateway;
use crate::middleware::{self, SessionCookie, SessionState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, StartupError, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let cfg = &services.config;
    let gateway = &services.gateway;

    let session_state = SessionState {
        store: services.sessions.clone(),
        cookie: SessionCookie {
            name: cfg.http.session.cookie_name.clone(),
            secure: cfg.http.session.secure_cookie,
            max_age: cfg.redis.ttl(),
            save_uninitialized: cfg.http.session.save_uninitialized,
        },
    };

    let admin = guarded(
        Router::new().route("/config", get(routes::system::config)),
        gateway,
        Some(Policy::realm_role("admin")),
    );
    let authenticated = guarded(
        Router::new().route("/whoami", get(routes::system::whoami)),
        gateway,
        None,
    );

    // Everything below needs a session; the status endpoints must not.
    let with_session = Router::new()
        .route(&cfg.auth.routes.login, post(routes::auth::login))
        .route(&cfg.auth.routes.logout, post(routes::auth::logout))
        .merge(admin)
        .merge(authenticated)
        .layer(from_fn_with_state(session_state, middleware::session_middleware));

    Router::new()
        .route("/", get(routes::system::root))
        .route("/healthcheck", get(routes::system::healthcheck))
        .merge(with_session)
        .layer(Extension(services.gateway.clone()))
        .layer(Extension(services.health.clone()))
        .layer(Extension(services.config.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(cors_layer(&cfg.http.cors)),
        )
}

/// Put `router`'s routes behind `protect(policy)`.
pub fn guarded(router: Router, gateway: &std::sync::Arc<AuthGateway>, policy: Option<Policy>) -> Router {
    router.route_layer(from_fn_with_state(
        gateway.protect(policy),
        middleware::protect_middleware,
    ))
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let origin = if cfg.origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cfg.origin
                .split(',')
                .filter_map(|o| HeaderValue::from_str(o.trim()).ok()),
        )
    };
    let headers: Vec<HeaderName> = cfg
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();
    let methods: Vec<Method> = cfg.methods.iter().filter_map(|m| m.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(headers)
        .allow_methods(methods)
}
