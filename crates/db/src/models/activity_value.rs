//! Activity value rows and DTOs.

use chrono::NaiveDate;
use esg_core::activity::{ActivityValue, AggregationLevel};
use esg_core::types::{DbId, Timestamp};
use esg_core::CoreError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of `activity_values`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityValueRow {
    pub id: DbId,
    pub metric_id: DbId,
    pub layer_id: DbId,
    pub assignment_id: Option<DbId>,
    pub reporting_period: NaiveDate,
    pub level: String,
    pub aggregated_numeric_value: Option<f64>,
    pub aggregated_text_value: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ActivityValueRow> for ActivityValue {
    type Error = CoreError;

    fn try_from(row: ActivityValueRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            metric_id: row.metric_id,
            layer_id: row.layer_id,
            assignment_id: row.assignment_id,
            reporting_period: row.reporting_period,
            level: AggregationLevel::parse(&row.level)?,
            numeric_value: row.aggregated_numeric_value,
            text_value: row.aggregated_text_value,
        })
    }
}

/// DTO for inserting an activity value.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateActivityValue {
    pub metric_id: DbId,
    pub layer_id: DbId,
    pub assignment_id: Option<DbId>,
    pub reporting_period: NaiveDate,
    pub level: AggregationLevel,
    pub aggregated_numeric_value: Option<f64>,
    pub aggregated_text_value: Option<String>,
}
