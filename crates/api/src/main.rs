use anyhow::Context;

use realmgate_api::app::{build_app, build_services};
use realmgate_infra::load_config;

const CONFIG_PATH_ENV: &str = "REALMGATE_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var(CONFIG_PATH_ENV).ok();
    let config = load_config(config_path.as_deref()).context("failed to load configuration")?;

    realmgate_observability::init_with_level(&config.logs.level);

    let name = config.name.clone();
    let version = config.version.clone();
    let port = config.http.port;

    let services = build_services(config)
        .await
        .context("failed to wire services")?;
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{port}"))?;

    tracing::info!("Service [{name}:{version}] running on port [{port}]");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
