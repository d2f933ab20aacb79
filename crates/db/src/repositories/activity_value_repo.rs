//! Repository for the `activity_values` table.
//!
//! Activity values are written upstream; `create` and `delete` exist for
//! seeding and tests. The engine reads "eligible" values only: those that
//! carry a numeric value, or a non-blank text value on a metric whose type
//! reads structured text (vehicle tracking).

use esg_core::activity::PeriodFilter;
use esg_core::metric::METRIC_TYPE_VEHICLE_TRACKING;
use esg_core::types::DbId;
use sqlx::PgPool;

use crate::models::activity_value::{ActivityValueRow, CreateActivityValue};

/// Column list for `activity_values` SELECT queries.
const COLUMNS: &str = "\
    id, metric_id, layer_id, assignment_id, reporting_period, level, \
    aggregated_numeric_value, aggregated_text_value, created_at, updated_at";

/// Same columns qualified with the `a` alias used by the eligibility queries.
const A_COLUMNS: &str = "\
    a.id, a.metric_id, a.layer_id, a.assignment_id, a.reporting_period, a.level, \
    a.aggregated_numeric_value, a.aggregated_text_value, a.created_at, a.updated_at";

/// SQL predicate for values worth calculating, over `activity_values a`.
/// Text-only values count only when their metric reads structured text.
fn eligible() -> String {
    format!(
        "(a.aggregated_numeric_value IS NOT NULL \
          OR (NULLIF(BTRIM(a.aggregated_text_value), '') IS NOT NULL \
              AND EXISTS (SELECT 1 FROM metrics m \
                          WHERE m.id = a.metric_id \
                            AND m.metric_type = '{METRIC_TYPE_VEHICLE_TRACKING}')))"
    )
}

/// Provides query operations for activity values.
pub struct ActivityValueRepo;

impl ActivityValueRepo {
    /// Insert an activity value.
    pub async fn create(
        pool: &PgPool,
        input: &CreateActivityValue,
    ) -> Result<ActivityValueRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO activity_values \
                (metric_id, layer_id, assignment_id, reporting_period, level, \
                 aggregated_numeric_value, aggregated_text_value) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActivityValueRow>(&query)
            .bind(input.metric_id)
            .bind(input.layer_id)
            .bind(input.assignment_id)
            .bind(input.reporting_period)
            .bind(input.level.as_str())
            .bind(input.aggregated_numeric_value)
            .bind(&input.aggregated_text_value)
            .fetch_one(pool)
            .await
    }

    /// Find an activity value by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ActivityValueRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM activity_values WHERE id = $1");
        sqlx::query_as::<_, ActivityValueRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Eligible values of an assignment, ordered by period then id.
    ///
    /// `period_date` takes precedence over `year`/`month`.
    pub async fn list_for_assignment(
        pool: &PgPool,
        assignment_id: DbId,
        filter: &PeriodFilter,
    ) -> Result<Vec<ActivityValueRow>, sqlx::Error> {
        let (year, month) = if filter.period_date.is_some() {
            (None, None)
        } else {
            (filter.year, filter.month.map(|m| m as i32))
        };
        let query = format!(
            "SELECT {A_COLUMNS} FROM activity_values a \
             WHERE a.assignment_id = $1 AND {eligible} \
               AND ($2::DATE IS NULL OR a.reporting_period = $2) \
               AND ($3::INTEGER IS NULL OR EXTRACT(YEAR FROM a.reporting_period)::INTEGER = $3) \
               AND ($4::INTEGER IS NULL OR EXTRACT(MONTH FROM a.reporting_period)::INTEGER = $4) \
               AND ($5::TEXT IS NULL OR a.level = $5) \
             ORDER BY a.reporting_period, a.id",
            eligible = eligible()
        );
        sqlx::query_as::<_, ActivityValueRow>(&query)
            .bind(assignment_id)
            .bind(filter.period_date)
            .bind(year)
            .bind(month)
            .bind(filter.level.map(|l| l.as_str()))
            .fetch_all(pool)
            .await
    }

    /// Every eligible value, ordered by id.
    pub async fn list_all_eligible(pool: &PgPool) -> Result<Vec<ActivityValueRow>, sqlx::Error> {
        let query = format!(
            "SELECT {A_COLUMNS} FROM activity_values a WHERE {eligible} ORDER BY a.id",
            eligible = eligible()
        );
        sqlx::query_as::<_, ActivityValueRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Permanently delete an activity value. Calculated records are left for
    /// the orphan sweep.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM activity_values WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
