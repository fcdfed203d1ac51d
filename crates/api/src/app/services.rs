//! Production wiring: registry, session store and health probes from `AppConfig`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use realmgate_auth::{RealmRegistry, RegistryError};
use realmgate_infra::AppConfig;
use realmgate_infra::health::{BuildInfo, HealthAggregator, PostgresProbe};
use realmgate_infra::session::SessionStore;
#[cfg(feature = "redis")]
use realmgate_infra::{
    cache::RedisConnector,
    health::RedisProbe,
    session::RedisSessionStore,
};
#[cfg(not(feature = "redis"))]
use realmgate_infra::session::InMemorySessionStore;

use crate::gateway::AuthGateway;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("realm registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("cache client: {0}")]
    Cache(String),
}

/// Everything the router needs, already wired.
#[derive(Clone)]
pub struct AppServices {
    pub config: Arc<AppConfig>,
    pub gateway: Arc<AuthGateway>,
    pub sessions: Arc<dyn SessionStore>,
    pub health: Arc<HealthAggregator>,
}

/// Build services from configuration.
///
/// Nothing here connects eagerly: the database pool and the cache client
/// connect on first use, so the process starts even while a dependency is down
/// and the health check can report it.
pub async fn build_services(config: AppConfig) -> Result<AppServices, StartupError> {
    let registry = RealmRegistry::from_keycloak_template(&config.auth.keycloak, &config.auth.realms)?;
    let gateway = Arc::new(AuthGateway::new(Arc::new(registry)));

    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .acquire_timeout(config.health.probe_timeout())
        .connect_lazy_with(config.db.connect_options());

    let build = match BuildInfo::from_git(Path::new(".")).await {
        Ok(build) => build,
        Err(e) => {
            tracing::warn!(error = %e, "no source revision available; reporting unknown");
            BuildInfo::unknown(Utc::now())
        }
    };

    let health = HealthAggregator::new(
        config.name.clone(),
        config.env.clone(),
        build,
        config.health.probe_timeout(),
    )
    .with_probe(Arc::new(PostgresProbe::new(pool)));

    #[cfg(feature = "redis")]
    let (sessions, health): (Arc<dyn SessionStore>, _) = {
        let redis = Arc::new(
            RedisConnector::new(config.redis.url(), config.redis.timeout())
                .map_err(|e| StartupError::Cache(e.to_string()))?,
        );
        let health = health.with_probe(Arc::new(RedisProbe::new(Arc::clone(&redis))));
        let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(redis, config.redis.ttl()));
        (sessions, health)
    };

    #[cfg(not(feature = "redis"))]
    let sessions: Arc<dyn SessionStore> = {
        tracing::warn!("built without redis; sessions are process-local");
        Arc::new(InMemorySessionStore::new(config.redis.ttl()))
    };

    Ok(AppServices {
        config: Arc::new(config),
        gateway,
        sessions,
        health: Arc::new(health),
    })
}
