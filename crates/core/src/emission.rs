//! Calculation results and calculated emission records.
//!
//! A strategy produces [`CalculationResult`]s; the calculator turns them into
//! [`NewCalculatedEmission`] rows (one primary plus optional components) and
//! hands them to an [`EmissionStore`](crate::store::EmissionStore).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::{ActivityValue, AggregationLevel};
use crate::factor::EmissionFactor;
use crate::types::{DbId, Scope, Timestamp};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Calculation metadata stored as JSON.
///
/// Known keys are typed; anything else lands in `extra` and round-trips
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_composite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_count: Option<usize>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CalculationMetadata {
    /// Metadata for the primary record of a composite group.
    pub fn composite(component_count: usize) -> Self {
        Self {
            is_composite: Some(true),
            component_count: Some(component_count),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    /// Read metadata back from JSON; non-object values become empty metadata.
    pub fn from_json(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Strategy output
// ---------------------------------------------------------------------------

/// One (factor, activity, emission) tuple produced by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResult {
    pub factor: EmissionFactor,
    pub activity_value: f64,
    pub emission_value: f64,
    /// Share of the group total, 0.0..=1.0.
    pub proportion: f64,
    pub metadata: CalculationMetadata,
    /// Distinguishes components that share a factor (e.g. two diesel cars).
    pub sub_entity_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// Insert payload for a calculated emission value.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalculatedEmission {
    pub source_activity_value_id: DbId,
    pub emission_factor_id: DbId,
    pub calculated_value: f64,
    pub emission_unit: String,
    pub group_id: Option<Uuid>,
    pub is_primary_record: bool,
    pub proportion: f64,
    pub metadata: CalculationMetadata,
    pub sub_entity_key: Option<String>,
    pub assignment_id: Option<DbId>,
    pub layer_id: DbId,
    pub metric_id: DbId,
    pub reporting_period: NaiveDate,
    pub level: AggregationLevel,
    pub scope: Option<Scope>,
}

impl NewCalculatedEmission {
    /// Build a record from a strategy result, copying the source context.
    pub fn from_result(
        source: &ActivityValue,
        result: &CalculationResult,
        metric_scope: Option<Scope>,
        group_id: Option<Uuid>,
        is_primary_record: bool,
    ) -> Self {
        Self {
            source_activity_value_id: source.id,
            emission_factor_id: result.factor.id,
            calculated_value: result.emission_value,
            emission_unit: result.factor.emission_unit(),
            group_id,
            is_primary_record,
            proportion: result.proportion,
            metadata: result.metadata.clone(),
            sub_entity_key: result.sub_entity_key.clone(),
            assignment_id: source.assignment_id,
            layer_id: source.layer_id,
            metric_id: source.metric_id,
            reporting_period: source.reporting_period,
            level: source.level,
            scope: result.factor.scope.or(metric_scope),
        }
    }
}

/// A persisted calculated emission value.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatedEmission {
    pub id: DbId,
    pub source_activity_value_id: DbId,
    pub emission_factor_id: DbId,
    pub calculated_value: f64,
    pub emission_unit: String,
    pub group_id: Option<Uuid>,
    pub is_primary_record: bool,
    pub proportion: f64,
    pub metadata: CalculationMetadata,
    pub sub_entity_key: Option<String>,
    pub assignment_id: Option<DbId>,
    pub layer_id: DbId,
    pub metric_id: DbId,
    pub reporting_period: NaiveDate,
    pub level: AggregationLevel,
    pub scope: Option<Scope>,
    pub created_at: Timestamp,
}

impl CalculatedEmission {
    /// Attach storage-assigned fields to an insert payload.
    pub fn from_new(id: DbId, created_at: Timestamp, new: NewCalculatedEmission) -> Self {
        Self {
            id,
            source_activity_value_id: new.source_activity_value_id,
            emission_factor_id: new.emission_factor_id,
            calculated_value: new.calculated_value,
            emission_unit: new.emission_unit,
            group_id: new.group_id,
            is_primary_record: new.is_primary_record,
            proportion: new.proportion,
            metadata: new.metadata,
            sub_entity_key: new.sub_entity_key,
            assignment_id: new.assignment_id,
            layer_id: new.layer_id,
            metric_id: new.metric_id,
            reporting_period: new.reporting_period,
            level: new.level,
            scope: new.scope,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_skips_absent_keys() {
        let meta = CalculationMetadata::composite(3);
        assert_eq!(
            meta.to_json(),
            json!({"is_composite": true, "component_count": 3})
        );
    }

    #[test]
    fn metadata_keeps_unknown_keys() {
        let raw = json!({"vehicle_label": "Van", "odometer_source": "gps"});
        let meta = CalculationMetadata::from_json(&raw);
        assert_eq!(meta.vehicle_label.as_deref(), Some("Van"));
        assert_eq!(meta.extra.get("odometer_source"), Some(&json!("gps")));
        assert_eq!(meta.to_json(), raw);
    }

    #[test]
    fn non_object_metadata_is_empty() {
        assert_eq!(
            CalculationMetadata::from_json(&json!("oops")),
            CalculationMetadata::default()
        );
    }
}
