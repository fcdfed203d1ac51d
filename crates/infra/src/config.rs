//! Static configuration: one immutable `AppConfig` loaded at startup.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults,
//! 2. a TOML file (`realmgate.toml`, or the path given explicitly),
//! 3. environment variables, e.g. `REALMGATE__REDIS__HOST=cache` or
//!    `REALMGATE__AUTH__REALMS=tenantA,tenantB`.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use realmgate_auth::KeycloakConfig;

pub const DEFAULT_CONFIG_FILE: &str = "realmgate.toml";
pub const ENV_PREFIX: &str = "REALMGATE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config load error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Deployment environment name reported by the health check.
    pub env: String,
    pub http: HttpConfig,
    pub auth: AuthConfig,
    pub redis: RedisConfig,
    pub db: DbConfig,
    pub health: HealthConfig,
    pub logs: LogsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "realmgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            env: "local".to_string(),
            http: HttpConfig::default(),
            auth: AuthConfig::default(),
            redis: RedisConfig::default(),
            db: DbConfig::default(),
            health: HealthConfig::default(),
            logs: LogsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub cors: CorsConfig,
    pub session: SessionConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 11010,
            cors: CorsConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Fixed CORS options; applied as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origin: String,
    pub allowed_headers: Vec<String>,
    pub methods: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            allowed_headers: vec!["authorization".into(), "content-type".into(), "realm".into()],
            methods: vec!["GET".into(), "PUT".into(), "POST".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Persist brand-new anonymous sessions (and set their cookie) even when
    /// nothing was written to them.
    pub save_uninitialized: bool,
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "realmgate.sid".to_string(),
            save_uninitialized: true,
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Template cloned once per entry of `realms`.
    pub keycloak: KeycloakConfig,
    pub realms: Vec<String>,
    pub routes: AuthRoutes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthRoutes {
    pub login: String,
    pub logout: String,
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            logout: "/logout".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Session TTL in seconds, refreshed on every access.
    pub ttl: u64,
    /// Upper bound for a single session-store command.
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            ttl: 260,
            timeout_ms: 2_000,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6432,
            database: "books".to_string(),
            user: "realmgate".to_string(),
            password: "realmgate".to_string(),
            max_connections: 5,
        }
    }
}

impl DbConfig {
    pub fn connect_options(&self) -> sqlx::postgres::PgConnectOptions {
        sqlx::postgres::PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Upper bound for a single dependency probe.
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 2_000,
        }
    }
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub level: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.realms.iter().all(|r| r.trim().is_empty()) {
            return Err(ConfigError::Invalid("auth.realms must name at least one realm".into()));
        }
        if self.auth.keycloak.resource.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.keycloak.resource must not be empty".into()));
        }
        if self.redis.ttl == 0 {
            return Err(ConfigError::Invalid("redis.ttl must be greater than zero".into()));
        }
        if self.http.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Invalid("http.session.cookie_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Load and validate configuration.
///
/// A missing file is not an error; defaults plus environment still apply.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let path = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

    let mut builder = Config::builder();
    if path.exists() {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.realms")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}
