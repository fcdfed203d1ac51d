//! Dependency health aggregation.
//!
//! `HealthAggregator::check` probes every configured dependency on demand (no
//! background polling) and always returns a well-formed report: probe errors,
//! timeouts and panics all become `Unhealthy` sub-reports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

mod build_info;
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_probe;
mod report;

pub use build_info::{BuildInfo, BuildInfoError};
pub use postgres::PostgresProbe;
#[cfg(feature = "redis")]
pub use redis_probe::RedisProbe;
pub use report::{DependencyReport, HealthReport, HealthStatus, overall_status};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Cache(String),
}

/// A targeted check against one dependency.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Name reported in `dependencies[].name`.
    fn name(&self) -> &str;

    /// Healthy on `Ok`, optionally with diagnostic metadata.
    async fn probe(&self) -> Result<Option<JsonValue>, ProbeError>;
}

/// Composes the `/health` report from the registered dependency checks.
///
/// `build` is read once at startup and reused for every report; a rebuild
/// shows up only after a restart.
pub struct HealthAggregator {
    service: String,
    env: String,
    build: BuildInfo,
    probe_timeout: Duration,
    probes: Vec<Arc<dyn DependencyProbe>>,
}

impl HealthAggregator {
    pub fn new(
        service: impl Into<String>,
        env: impl Into<String>,
        build: BuildInfo,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            service: service.into(),
            env: env.into(),
            build,
            probe_timeout,
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Probe all dependencies and compose the service status.
    ///
    /// Probes run concurrently, each in its own task; the report lists them in
    /// registration order, exactly one entry per probe.
    pub async fn check(&self) -> HealthReport {
        let tasks: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = Arc::clone(probe);
                let limit = self.probe_timeout;
                tokio::spawn(async move { tokio::time::timeout(limit, probe.probe()).await })
            })
            .collect();

        let mut dependencies = Vec::with_capacity(tasks.len());
        for (probe, task) in self.probes.iter().zip(tasks) {
            let name = probe.name();
            let report = match task.await {
                Ok(Ok(Ok(metadata))) => DependencyReport::healthy(name, metadata),
                Ok(Ok(Err(e))) => DependencyReport::unhealthy(name, e.to_string()),
                Ok(Err(_)) => DependencyReport::unhealthy(
                    name,
                    format!("probe timed out after {}ms", self.probe_timeout.as_millis()),
                ),
                Err(e) => DependencyReport::unhealthy(name, format!("probe aborted: {e}")),
            };
            if !report.status.is_healthy() {
                tracing::warn!(
                    dependency = name,
                    reason = report.message.as_deref().unwrap_or_default(),
                    "dependency unhealthy"
                );
            }
            dependencies.push(report);
        }

        HealthReport {
            service: self.service.clone(),
            message: self.build.message.clone(),
            version: self.build.version,
            status: overall_status(&dependencies),
            env: self.env.clone(),
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    enum Behaviour {
        Ok(Option<JsonValue>),
        Fail(&'static str),
        Hang,
        Panic,
    }

    struct FakeProbe {
        name: &'static str,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl DependencyProbe for FakeProbe {
        fn name(&self) -> &str {
            self.name
        }

        async fn probe(&self) -> Result<Option<JsonValue>, ProbeError> {
            match &self.behaviour {
                Behaviour::Ok(meta) => Ok(meta.clone()),
                Behaviour::Fail(msg) => Err(ProbeError::Database(msg.to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(None)
                }
                Behaviour::Panic => panic!("probe exploded"),
            }
        }
    }

    fn aggregator(db: Behaviour, cache: Behaviour) -> HealthAggregator {
        HealthAggregator::new(
            "realmgate",
            "test",
            BuildInfo::unknown(Utc::now()),
            Duration::from_millis(100),
        )
        .with_probe(Arc::new(FakeProbe { name: "database", behaviour: db }))
        .with_probe(Arc::new(FakeProbe { name: "cache", behaviour: cache }))
    }

    fn names(report: &HealthReport) -> Vec<&str> {
        report.dependencies.iter().map(|d| d.name.as_str()).collect()
    }

    #[tokio::test]
    async fn all_healthy_is_healthy() {
        let report = aggregator(Behaviour::Ok(Some(json!({"cache": {"ratio": 0.99}}))), Behaviour::Ok(None))
            .check()
            .await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(names(&report), vec!["database", "cache"]);
        assert_eq!(report.dependencies[0].metadata, Some(json!({"cache": {"ratio": 0.99}})));
        assert_eq!(report.env, "test");
    }

    #[tokio::test]
    async fn failing_database_makes_service_unhealthy() {
        let report = aggregator(Behaviour::Fail("connection refused"), Behaviour::Ok(None))
            .check()
            .await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(names(&report), vec!["database", "cache"]);
        assert_eq!(report.dependencies[0].status, HealthStatus::Unhealthy);
        assert_eq!(report.dependencies[0].message.as_deref(), Some("connection refused"));
        assert_eq!(report.dependencies[1].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn hanging_and_panicking_probes_still_yield_one_entry_each() {
        let report = aggregator(Behaviour::Hang, Behaviour::Panic).check().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(names(&report), vec!["database", "cache"]);
        assert!(report.dependencies[0].message.as_deref().unwrap().contains("timed out"));
        assert!(report.dependencies[1].message.as_deref().unwrap().contains("aborted"));
    }

    #[tokio::test]
    async fn report_serializes_with_expected_shape() {
        let report = aggregator(Behaviour::Ok(None), Behaviour::Fail("down")).check().await;
        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body["status"], "Unhealthy");
        assert_eq!(body["service"], "realmgate");
        assert_eq!(body["dependencies"][0], json!({"name": "database", "status": "Healthy"}));
        assert_eq!(body["dependencies"][1]["message"], "down");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn build_metadata_is_fixed_across_reports() {
        let agg = aggregator(Behaviour::Ok(None), Behaviour::Ok(None));
        let first = agg.check().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = agg.check().await;
        assert_eq!(first.version, second.version);
        assert_eq!(first.message, second.message);
    }
}
