//! Cache probe: write a sentinel, then read it back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{DependencyProbe, ProbeError};
use crate::cache::{CacheError, RedisConnector};

const SENTINEL_KEY: &str = "healthcheck";
const SENTINEL_VALUE: &str = "Ok";

impl From<CacheError> for ProbeError {
    fn from(value: CacheError) -> Self {
        ProbeError::Cache(value.to_string())
    }
}

pub struct RedisProbe {
    redis: Arc<RedisConnector>,
}

impl RedisProbe {
    pub fn new(redis: Arc<RedisConnector>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl DependencyProbe for RedisProbe {
    fn name(&self) -> &str {
        "cache"
    }

    async fn probe(&self) -> Result<Option<JsonValue>, ProbeError> {
        // The write completes before the read is issued.
        self.redis
            .query::<()>(redis::cmd("SET").arg(SENTINEL_KEY).arg(SENTINEL_VALUE))
            .await?;
        let read: Option<String> = self.redis.query(redis::cmd("GET").arg(SENTINEL_KEY)).await?;

        match read.as_deref() {
            Some(SENTINEL_VALUE) => Ok(None),
            other => Err(ProbeError::Cache(format!(
                "sentinel read back as {other:?}, expected {SENTINEL_VALUE:?}"
            ))),
        }
    }
}
