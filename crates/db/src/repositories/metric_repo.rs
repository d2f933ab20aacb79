//! Repository for the `metrics` table.

use esg_core::types::DbId;
use sqlx::PgPool;

use crate::models::metric::{CreateMetric, MetricRow};

/// Column list for `metrics` SELECT queries.
const COLUMNS: &str = "\
    id, name, metric_type, emission_category, emission_sub_category, \
    activity_unit, location, scope, type_config, created_at, updated_at";

/// Provides query operations for metrics.
pub struct MetricRepo;

impl MetricRepo {
    /// Insert a metric. `type_config` defaults to `{}`.
    pub async fn create(pool: &PgPool, input: &CreateMetric) -> Result<MetricRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO metrics \
                (name, metric_type, emission_category, emission_sub_category, \
                 activity_unit, location, scope, type_config) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, '{{}}'::jsonb)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MetricRow>(&query)
            .bind(&input.name)
            .bind(&input.metric_type)
            .bind(&input.emission_category)
            .bind(&input.emission_sub_category)
            .bind(&input.activity_unit)
            .bind(&input.location)
            .bind(input.scope)
            .bind(&input.type_config)
            .fetch_one(pool)
            .await
    }

    /// Find a metric by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MetricRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM metrics WHERE id = $1");
        sqlx::query_as::<_, MetricRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
