//! Repository for the `emission_factors` table.
//!
//! The calculation engine only reads factors; inserts and deletes exist for
//! factor administration and seeding.

use esg_core::factor::{FactorCriteria, RegionMatch, YearMatch};
use esg_core::types::DbId;
use sqlx::PgPool;

use crate::models::emission_factor::{CreateEmissionFactor, EmissionFactorRow};

/// Column list for `emission_factors` SELECT queries.
const COLUMNS: &str = "\
    id, year, category, sub_category, activity_unit, value, factor_unit, \
    region, scope, source, created_at, updated_at";

/// SQL predicate for a universal region (`NULL`, empty or `ALL`).
const UNIVERSAL_REGION: &str =
    "(region IS NULL OR BTRIM(region) = '' OR UPPER(BTRIM(region)) = 'ALL')";

/// Provides query operations for emission factors.
pub struct EmissionFactorRepo;

impl EmissionFactorRepo {
    /// Insert a new factor.
    pub async fn create(
        pool: &PgPool,
        input: &CreateEmissionFactor,
    ) -> Result<EmissionFactorRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO emission_factors \
                (year, category, sub_category, activity_unit, value, factor_unit, region, scope, source) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EmissionFactorRow>(&query)
            .bind(input.year)
            .bind(&input.category)
            .bind(&input.sub_category)
            .bind(&input.activity_unit)
            .bind(input.value)
            .bind(&input.factor_unit)
            .bind(&input.region)
            .bind(input.scope)
            .bind(&input.source)
            .fetch_one(pool)
            .await
    }

    /// Find a factor by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<EmissionFactorRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM emission_factors WHERE id = $1");
        sqlx::query_as::<_, EmissionFactorRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List every factor, most recent year first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<EmissionFactorRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM emission_factors \
             ORDER BY year DESC, category, sub_category, id"
        );
        sqlx::query_as::<_, EmissionFactorRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// The first factor matching `criteria` in natural order.
    ///
    /// The ORDER BY mirrors `esg_core::factor::natural_order`: most recent
    /// year, named region before universal, then unit, factor unit, scope
    /// (nulls last) and id, with byte-wise text comparison.
    pub async fn find_first(
        pool: &PgPool,
        criteria: &FactorCriteria,
    ) -> Result<Option<EmissionFactorRow>, sqlx::Error> {
        let (year, before) = match criteria.year {
            YearMatch::Exact(y) => (y, false),
            YearMatch::Before(y) => (y, true),
        };
        let region = match &criteria.region {
            RegionMatch::Named(r) => Some(r.as_str()),
            RegionMatch::Universal => None,
        };

        let query = format!(
            "SELECT {COLUMNS} FROM emission_factors \
             WHERE category = $1 AND sub_category = $2 \
               AND (CASE WHEN $4 THEN year < $3 ELSE year = $3 END) \
               AND ($5::TEXT IS NULL OR activity_unit = $5) \
               AND ($6::SMALLINT IS NULL OR scope = $6) \
               AND (CASE WHEN $7::TEXT IS NULL THEN {UNIVERSAL_REGION} ELSE region = $7 END) \
             ORDER BY year DESC, \
                {UNIVERSAL_REGION} ASC, \
                region COLLATE \"C\" ASC NULLS LAST, \
                activity_unit COLLATE \"C\" ASC, \
                factor_unit COLLATE \"C\" ASC, \
                scope ASC NULLS LAST, \
                id ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, EmissionFactorRow>(&query)
            .bind(&criteria.category)
            .bind(&criteria.sub_category)
            .bind(year)
            .bind(before)
            .bind(criteria.activity_unit.as_deref())
            .bind(criteria.scope)
            .bind(region)
            .fetch_optional(pool)
            .await
    }

    /// Delete a factor. Fails with a foreign-key violation while any
    /// calculated emission value references it.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM emission_factors WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether any calculated emission value references the factor.
    pub async fn is_in_use(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM calculated_emission_values WHERE emission_factor_id = $1)",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
