//! Calculated emission value rows and read-side DTOs.

use chrono::NaiveDate;
use esg_core::activity::AggregationLevel;
use esg_core::emission::{CalculatedEmission, CalculationMetadata};
use esg_core::types::{DbId, Scope, Timestamp};
use esg_core::CoreError;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row of `calculated_emission_values`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CalculatedEmissionRow {
    pub id: DbId,
    pub source_activity_value_id: DbId,
    pub emission_factor_id: DbId,
    pub calculated_value: f64,
    pub emission_unit: String,
    pub group_id: Option<Uuid>,
    pub is_primary_record: bool,
    pub proportion: f64,
    pub calculation_metadata: serde_json::Value,
    pub sub_entity_key: Option<String>,
    pub assignment_id: Option<DbId>,
    pub layer_id: DbId,
    pub metric_id: DbId,
    pub reporting_period: NaiveDate,
    pub level: String,
    pub scope: Option<Scope>,
    pub created_at: Timestamp,
}

impl TryFrom<CalculatedEmissionRow> for CalculatedEmission {
    type Error = CoreError;

    fn try_from(row: CalculatedEmissionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            source_activity_value_id: row.source_activity_value_id,
            emission_factor_id: row.emission_factor_id,
            calculated_value: row.calculated_value,
            emission_unit: row.emission_unit,
            group_id: row.group_id,
            is_primary_record: row.is_primary_record,
            proportion: row.proportion,
            metadata: CalculationMetadata::from_json(&row.calculation_metadata),
            sub_entity_key: row.sub_entity_key,
            assignment_id: row.assignment_id,
            layer_id: row.layer_id,
            metric_id: row.metric_id,
            reporting_period: row.reporting_period,
            level: AggregationLevel::parse(&row.level)?,
            scope: row.scope,
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Read-side DTOs
// ---------------------------------------------------------------------------

/// Sum of primary records for one (scope, unit) pair.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScopeTotal {
    pub scope: Option<Scope>,
    pub emission_unit: String,
    pub total: f64,
    pub record_count: i64,
}
