use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use realmgate_core::SessionId;
use realmgate_infra::session::{CommitOutcome, SessionHandle, SessionStore};

use crate::app::errors::gateway_error_to_response;
use crate::context::RealmContext;
use crate::gateway::Protect;
use crate::realm;

/// Cookie attributes for the session id.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
    pub max_age: std::time::Duration,
    pub save_uninitialized: bool,
}

impl SessionCookie {
    fn issue(&self, id: SessionId) -> Cookie<'static> {
        Cookie::build((self.name.clone(), id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(self.max_age.as_secs() as i64))
            .build()
    }

    fn removal(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), "")).path("/").build()
    }
}

#[derive(Clone)]
pub struct SessionState {
    pub store: Arc<dyn SessionStore>,
    pub cookie: SessionCookie,
}

/// Load (or start) the caller's session, expose it to inner layers as a
/// `SessionHandle` extension, then commit it once the handler has run.
pub async fn session_middleware(
    State(state): State<SessionState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // A cookie that is not a session id is ignored, like an unknown one.
    let id = jar
        .get(&state.cookie.name)
        .and_then(|c| c.value().parse::<SessionId>().ok());

    let session = SessionHandle::load_or_create(Arc::clone(&state.store), id).await;
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;

    let jar = match session.commit(state.cookie.save_uninitialized).await {
        Ok(CommitOutcome::Destroyed) => jar.remove(state.cookie.removal()),
        Ok(outcome) if outcome.keeps_cookie() => jar.add(state.cookie.issue(session.id())),
        Ok(_) => jar,
        Err(e) => {
            tracing::warn!(session = %session.id(), error = %e, "session commit failed");
            jar
        }
    };

    (jar, response).into_response()
}

/// Route guard; state comes from `AuthGateway::protect`.
///
/// Must run inside `session_middleware`.
pub async fn protect_middleware(
    State(guard): State<Protect>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let realm = realm::resolve(req.headers(), req.uri());

    let Some(session) = req.extensions().get::<SessionHandle>().cloned() else {
        tracing::error!("protected route mounted outside the session layer");
        return gateway_error_to_response(realmgate_core::GatewayError::dependency(
            "session layer missing",
        ));
    };

    match guard.check(realm, &session).await {
        Ok(auth) => {
            req.extensions_mut().insert(RealmContext::new(auth.realm().clone()));
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => gateway_error_to_response(e),
    }
}
