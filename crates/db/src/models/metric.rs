//! Metric rows: the emission-relevant columns of the upstream metric table.
//!
//! Type-specific configuration lives in the `type_config` JSONB column and
//! is decoded per `metric_type` into [`MetricKind`].

use esg_core::metric::{Metric, MetricKind, MetricType, VehicleTrackingConfig};
use esg_core::types::{DbId, Scope, Timestamp};
use esg_core::CoreError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row of `metrics`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MetricRow {
    pub id: DbId,
    pub name: String,
    pub metric_type: String,
    pub emission_category: Option<String>,
    pub emission_sub_category: Option<String>,
    pub activity_unit: Option<String>,
    pub location: Option<String>,
    pub scope: Option<Scope>,
    pub type_config: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// `type_config` shape for time-series metrics.
#[derive(Debug, Default, Deserialize)]
struct TimeSeriesConfig {
    #[serde(default)]
    frequency: String,
    #[serde(default)]
    aggregation_method: String,
}

impl MetricRow {
    /// Decode into the engine's metric type.
    pub fn into_metric(self) -> Result<Metric, CoreError> {
        let metric_type = MetricType::parse(&self.metric_type)?;
        let kind = match metric_type {
            MetricType::Basic => MetricKind::Basic,
            MetricType::Tabular => MetricKind::Tabular,
            MetricType::MultiField => MetricKind::MultiField,
            MetricType::TimeSeries => {
                let cfg: TimeSeriesConfig = decode_config(self.id, &self.type_config)?;
                MetricKind::TimeSeries {
                    frequency: cfg.frequency,
                    aggregation_method: cfg.aggregation_method,
                }
            }
            MetricType::VehicleTracking => {
                let cfg: VehicleTrackingConfig = decode_config(self.id, &self.type_config)?;
                MetricKind::VehicleTracking(cfg)
            }
        };

        Ok(Metric {
            id: self.id,
            name: self.name,
            kind,
            emission_category: self.emission_category,
            emission_sub_category: self.emission_sub_category,
            activity_unit: self.activity_unit,
            location: self.location,
            scope: self.scope,
        })
    }
}

fn decode_config<T: serde::de::DeserializeOwned>(
    metric_id: DbId,
    raw: &serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        CoreError::MalformedInput(format!("metric {metric_id} has invalid type_config: {e}"))
    })
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for inserting a metric.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMetric {
    pub name: String,
    pub metric_type: String,
    pub emission_category: Option<String>,
    pub emission_sub_category: Option<String>,
    pub activity_unit: Option<String>,
    pub location: Option<String>,
    pub scope: Option<Scope>,
    pub type_config: Option<serde_json::Value>,
}
