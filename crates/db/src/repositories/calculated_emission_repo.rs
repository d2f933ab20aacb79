//! Repository for the `calculated_emission_values` table.
//!
//! Rows are only ever written through `PgStore::replace_for_source`
//! (see [`crate::store::PgStore`]), which swaps a source's complete record
//! set inside one transaction using the `_tx` helpers below.

use chrono::NaiveDate;
use esg_core::emission::NewCalculatedEmission;
use esg_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::calculated_emission::{CalculatedEmissionRow, ScopeTotal};

/// Column list for `calculated_emission_values` SELECT queries.
const COLUMNS: &str = "\
    id, source_activity_value_id, emission_factor_id, calculated_value, emission_unit, \
    group_id, is_primary_record, proportion, calculation_metadata, sub_entity_key, \
    assignment_id, layer_id, metric_id, reporting_period, level, scope, created_at";

/// Provides query operations for calculated emission values.
pub struct CalculatedEmissionRepo;

impl CalculatedEmissionRepo {
    /// Delete every record of a source inside an open transaction.
    pub async fn delete_for_source_tx(
        tx: &mut Transaction<'_, Postgres>,
        source_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM calculated_emission_values WHERE source_activity_value_id = $1",
        )
        .bind(source_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert one record inside an open transaction.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &NewCalculatedEmission,
    ) -> Result<CalculatedEmissionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO calculated_emission_values \
                (source_activity_value_id, emission_factor_id, calculated_value, emission_unit, \
                 group_id, is_primary_record, proportion, calculation_metadata, sub_entity_key, \
                 assignment_id, layer_id, metric_id, reporting_period, level, scope) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalculatedEmissionRow>(&query)
            .bind(input.source_activity_value_id)
            .bind(input.emission_factor_id)
            .bind(input.calculated_value)
            .bind(&input.emission_unit)
            .bind(input.group_id)
            .bind(input.is_primary_record)
            .bind(input.proportion)
            .bind(input.metadata.to_json())
            .bind(&input.sub_entity_key)
            .bind(input.assignment_id)
            .bind(input.layer_id)
            .bind(input.metric_id)
            .bind(input.reporting_period)
            .bind(input.level.as_str())
            .bind(input.scope)
            .fetch_one(&mut **tx)
            .await
    }

    /// Delete every record of a source.
    pub async fn delete_for_source(pool: &PgPool, source_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM calculated_emission_values WHERE source_activity_value_id = $1",
        )
        .bind(source_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete records whose source activity value no longer exists.
    pub async fn delete_orphans(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM calculated_emission_values c \
             WHERE NOT EXISTS ( \
                SELECT 1 FROM activity_values a WHERE a.id = c.source_activity_value_id \
             )",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Records of a source, primary record first.
    pub async fn list_for_source(
        pool: &PgPool,
        source_id: DbId,
    ) -> Result<Vec<CalculatedEmissionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calculated_emission_values \
             WHERE source_activity_value_id = $1 \
             ORDER BY is_primary_record DESC, id"
        );
        sqlx::query_as::<_, CalculatedEmissionRow>(&query)
            .bind(source_id)
            .fetch_all(pool)
            .await
    }

    /// Count all records, split into (primary, component).
    pub async fn count_by_kind(pool: &PgPool) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as(
            "SELECT \
                COUNT(*) FILTER (WHERE is_primary_record), \
                COUNT(*) FILTER (WHERE NOT is_primary_record) \
             FROM calculated_emission_values",
        )
        .fetch_one(pool)
        .await
    }

    /// Totals of primary records per (scope, unit) for an assignment,
    /// optionally bounded by reporting period (inclusive).
    ///
    /// Only primary records are summed so composite groups count once.
    pub async fn totals_by_scope(
        pool: &PgPool,
        assignment_id: DbId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ScopeTotal>, sqlx::Error> {
        sqlx::query_as::<_, ScopeTotal>(
            "SELECT scope, emission_unit, \
                SUM(calculated_value) AS total, COUNT(*) AS record_count \
             FROM calculated_emission_values \
             WHERE assignment_id = $1 AND is_primary_record \
               AND ($2::DATE IS NULL OR reporting_period >= $2) \
               AND ($3::DATE IS NULL OR reporting_period <= $3) \
             GROUP BY scope, emission_unit \
             ORDER BY scope NULLS LAST, emission_unit",
        )
        .bind(assignment_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }
}
