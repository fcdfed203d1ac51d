use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Verdict for one dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub name: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DependencyReport {
    pub fn healthy(name: impl Into<String>, metadata: Option<JsonValue>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            metadata,
            message: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            metadata: None,
            message: Some(message.into()),
        }
    }
}

/// Service-level health, recomputed on every check and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub service: String,
    /// Subject of the most recent source revision.
    pub message: String,
    /// Timestamp of the most recent source revision.
    pub version: DateTime<Utc>,
    pub status: HealthStatus,
    pub env: String,
    pub dependencies: Vec<DependencyReport>,
}

/// Overall status is healthy iff every dependency is.
pub fn overall_status(dependencies: &[DependencyReport]) -> HealthStatus {
    if dependencies.iter().all(|d| d.status.is_healthy()) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    }
}
