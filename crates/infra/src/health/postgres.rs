//! Relational store probe.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use sqlx::{PgPool, Row};

use super::{DependencyProbe, ProbeError};

const CACHE_HIT_RATIO: &str = r#"
SELECT
    COALESCE(sum(heap_blks_read), 0)::float8 AS heap_read,
    COALESCE(sum(heap_blks_hit), 0)::float8 AS heap_hit,
    (sum(heap_blks_hit) / NULLIF(sum(heap_blks_hit) + sum(heap_blks_read), 0))::float8 AS ratio
FROM pg_statio_user_tables
"#;

const TABLE_BLOAT: &str = r#"
SELECT
    schemaname::text AS schema_name,
    relname::text AS table_name,
    n_live_tup::int8 AS live_tuples,
    n_dead_tup::int8 AS dead_tuples,
    (n_dead_tup::float8 / NULLIF(n_live_tup + n_dead_tup, 0))::float8 AS dead_ratio
FROM pg_stat_user_tables
ORDER BY n_dead_tup DESC
LIMIT 10
"#;

impl From<sqlx::Error> for ProbeError {
    fn from(value: sqlx::Error) -> Self {
        ProbeError::Database(value.to_string())
    }
}

/// Runs the diagnostic queries inside one read-only transaction.
pub struct PostgresProbe {
    pool: PgPool,
}

impl PostgresProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyProbe for PostgresProbe {
    fn name(&self) -> &str {
        "database"
    }

    async fn probe(&self) -> Result<Option<JsonValue>, ProbeError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(CACHE_HIT_RATIO).fetch_one(&mut *tx).await?;
        let cache = json!({
            "heap_read": row.try_get::<f64, _>("heap_read")?,
            "heap_hit": row.try_get::<f64, _>("heap_hit")?,
            "ratio": row.try_get::<Option<f64>, _>("ratio")?,
        });

        let rows = sqlx::query(TABLE_BLOAT).fetch_all(&mut *tx).await?;
        let mut bloat = Vec::with_capacity(rows.len());
        for row in rows {
            bloat.push(json!({
                "schema": row.try_get::<String, _>("schema_name")?,
                "table": row.try_get::<String, _>("table_name")?,
                "live_tuples": row.try_get::<i64, _>("live_tuples")?,
                "dead_tuples": row.try_get::<i64, _>("dead_tuples")?,
                "dead_ratio": row.try_get::<Option<f64>, _>("dead_ratio")?,
            }));
        }

        tx.commit().await?;
        Ok(Some(json!({ "cache": cache, "bloat": bloat })))
    }
}
