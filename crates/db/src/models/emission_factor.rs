//! Emission factor rows and DTOs.

use esg_core::factor::{validate_factor, EmissionFactor};
use esg_core::types::{DbId, Scope, Timestamp};
use esg_core::CoreError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row of `emission_factors`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmissionFactorRow {
    pub id: DbId,
    pub year: i32,
    pub category: String,
    pub sub_category: String,
    pub activity_unit: String,
    pub value: f64,
    pub factor_unit: String,
    pub region: Option<String>,
    pub scope: Option<Scope>,
    pub source: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<EmissionFactorRow> for EmissionFactor {
    fn from(row: EmissionFactorRow) -> Self {
        Self {
            id: row.id,
            year: row.year,
            category: row.category,
            sub_category: row.sub_category,
            activity_unit: row.activity_unit,
            value: row.value,
            factor_unit: row.factor_unit,
            region: row.region,
            scope: row.scope,
            source: row.source,
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for inserting a new emission factor.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmissionFactor {
    pub year: i32,
    pub category: String,
    pub sub_category: String,
    pub activity_unit: String,
    pub value: f64,
    pub factor_unit: String,
    pub region: Option<String>,
    pub scope: Option<Scope>,
    pub source: Option<String>,
}

impl CreateEmissionFactor {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_factor(
            &self.category,
            &self.sub_category,
            &self.activity_unit,
            &self.factor_unit,
            self.value,
            self.scope,
        )
    }
}
