//! Metric definitions as seen by the calculation engine.
//!
//! Metrics are polymorphic: the [`MetricKind`] enum carries the per-type
//! configuration, and [`MetricType`] is the data-free tag the strategy
//! registry dispatches on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Scope};

// ---------------------------------------------------------------------------
// Metric type tag
// ---------------------------------------------------------------------------

pub const METRIC_TYPE_BASIC: &str = "basic";
pub const METRIC_TYPE_TIME_SERIES: &str = "time_series";
pub const METRIC_TYPE_VEHICLE_TRACKING: &str = "vehicle_tracking";
pub const METRIC_TYPE_TABULAR: &str = "tabular";
pub const METRIC_TYPE_MULTI_FIELD: &str = "multi_field";

/// All valid metric type strings.
pub const VALID_METRIC_TYPES: &[&str] = &[
    METRIC_TYPE_BASIC,
    METRIC_TYPE_TIME_SERIES,
    METRIC_TYPE_VEHICLE_TRACKING,
    METRIC_TYPE_TABULAR,
    METRIC_TYPE_MULTI_FIELD,
];

/// Runtime type tag of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Basic,
    TimeSeries,
    VehicleTracking,
    Tabular,
    MultiField,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => METRIC_TYPE_BASIC,
            Self::TimeSeries => METRIC_TYPE_TIME_SERIES,
            Self::VehicleTracking => METRIC_TYPE_VEHICLE_TRACKING,
            Self::Tabular => METRIC_TYPE_TABULAR,
            Self::MultiField => METRIC_TYPE_MULTI_FIELD,
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            METRIC_TYPE_BASIC => Ok(Self::Basic),
            METRIC_TYPE_TIME_SERIES => Ok(Self::TimeSeries),
            METRIC_TYPE_VEHICLE_TRACKING => Ok(Self::VehicleTracking),
            METRIC_TYPE_TABULAR => Ok(Self::Tabular),
            METRIC_TYPE_MULTI_FIELD => Ok(Self::MultiField),
            other => Err(CoreError::Validation(format!(
                "Unknown metric type: '{other}'. Valid types: {}",
                VALID_METRIC_TYPES.join(", ")
            ))),
        }
    }

    /// Composite types read their input from the structured text value and
    /// do not need a numeric magnitude.
    pub fn reads_structured_text(self) -> bool {
        matches!(self, Self::VehicleTracking)
    }

    /// Types that derive their emission category without explicit metric
    /// configuration.
    pub fn derives_emission_category(self) -> bool {
        matches!(self, Self::VehicleTracking)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Per-type configuration
// ---------------------------------------------------------------------------

/// A stored value with its human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledChoice {
    pub value: String,
    pub label: String,
}

/// Default emission category for vehicle fuel combustion.
pub const DEFAULT_VEHICLE_CATEGORY: &str = "transport";

fn default_vehicle_category() -> String {
    DEFAULT_VEHICLE_CATEGORY.to_string()
}

/// Configuration carried by vehicle-tracking metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTrackingConfig {
    /// Maps `"{vehicle_type}_{fuel_type}"` or `"{fuel_type}"` to an emission
    /// sub-category.
    #[serde(default)]
    pub emission_mapping: HashMap<String, String>,
    #[serde(default)]
    pub vehicle_type_choices: Vec<LabelledChoice>,
    #[serde(default)]
    pub fuel_type_choices: Vec<LabelledChoice>,
    /// Category used for every vehicle factor lookup.
    #[serde(default = "default_vehicle_category")]
    pub emission_category: String,
}

impl Default for VehicleTrackingConfig {
    fn default() -> Self {
        Self {
            emission_mapping: HashMap::new(),
            vehicle_type_choices: Vec::new(),
            fuel_type_choices: Vec::new(),
            emission_category: default_vehicle_category(),
        }
    }
}

impl VehicleTrackingConfig {
    /// Emission sub-category for a vehicle/fuel pair.
    ///
    /// Looks up `"{vehicle}_{fuel}"`, then `"{fuel}"`, and otherwise uses the
    /// combined key itself.
    pub fn sub_category_for(&self, vehicle_type: &str, fuel_type: &str) -> String {
        let combined = format!("{vehicle_type}_{fuel_type}");
        if let Some(sub) = self.emission_mapping.get(&combined) {
            return sub.clone();
        }
        if let Some(sub) = self.emission_mapping.get(fuel_type) {
            return sub.clone();
        }
        combined
    }

    pub fn vehicle_label(&self, value: &str) -> String {
        label_for(&self.vehicle_type_choices, value)
    }

    pub fn fuel_label(&self, value: &str) -> String {
        label_for(&self.fuel_type_choices, value)
    }
}

fn label_for(choices: &[LabelledChoice], value: &str) -> String {
    choices
        .iter()
        .find(|c| c.value == value)
        .map(|c| c.label.clone())
        .unwrap_or_else(|| value.to_string())
}

/// Metric variants with their type-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric_type", rename_all = "snake_case")]
pub enum MetricKind {
    Basic,
    TimeSeries {
        frequency: String,
        aggregation_method: String,
    },
    VehicleTracking(VehicleTrackingConfig),
    Tabular,
    MultiField,
}

impl MetricKind {
    pub fn metric_type(&self) -> MetricType {
        match self {
            Self::Basic => MetricType::Basic,
            Self::TimeSeries { .. } => MetricType::TimeSeries,
            Self::VehicleTracking(_) => MetricType::VehicleTracking,
            Self::Tabular => MetricType::Tabular,
            Self::MultiField => MetricType::MultiField,
        }
    }
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// The emission-relevant slice of a metric definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: DbId,
    pub name: String,
    pub kind: MetricKind,
    pub emission_category: Option<String>,
    pub emission_sub_category: Option<String>,
    /// Unit the activity is recorded in, matched against factor activity units.
    pub activity_unit: Option<String>,
    /// Region used for factor lookup.
    pub location: Option<String>,
    pub scope: Option<Scope>,
}

impl Metric {
    pub fn metric_type(&self) -> MetricType {
        self.kind.metric_type()
    }

    /// Category and sub-category when both are configured and non-blank.
    pub fn emission_config(&self) -> Option<(&str, &str)> {
        let category = self.emission_category.as_deref().map(str::trim)?;
        let sub_category = self.emission_sub_category.as_deref().map(str::trim)?;
        if category.is_empty() || sub_category.is_empty() {
            return None;
        }
        Some((category, sub_category))
    }

    pub fn vehicle_config(&self) -> Option<&VehicleTrackingConfig> {
        match &self.kind {
            MetricKind::VehicleTracking(cfg) => Some(cfg),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
