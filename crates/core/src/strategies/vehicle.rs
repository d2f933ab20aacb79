//! Vehicle tracking: one composite activity value, many vehicles.
//!
//! The structured text value holds a JSON vehicle log, either a bare array
//! or an object with a `vehicles` array:
//!
//! ```json
//! [{"vehicle_type": "car", "fuel_type": "diesel", "fuel_consumed": 100,
//!   "kilometers": 850, "registration_number": "AB 1234"}]
//! ```
//!
//! Each usable entry resolves its own factor and becomes one result whose
//! proportion is its share of the fuel consumed.

use async_trait::async_trait;
use serde_json::Value;

use crate::activity::ActivityValue;
use crate::emission::{CalculationMetadata, CalculationResult};
use crate::error::CoreError;
use crate::metric::{Metric, VehicleTrackingConfig};
use crate::resolver::FactorLookup;

use super::{CalculationStrategy, StrategyContext};

/// A vehicle log entry with the fields the calculation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleEntry {
    pub index: usize,
    pub vehicle_type: String,
    pub fuel_type: String,
    pub fuel_consumed: f64,
    pub distance: Option<f64>,
    pub registration: Option<String>,
}

impl VehicleEntry {
    /// Stable key distinguishing this entry among its group's components.
    pub fn sub_entity_key(&self) -> String {
        match &self.registration {
            Some(reg) => format!("entry:{}:{reg}", self.index),
            None => format!("entry:{}", self.index),
        }
    }
}

/// Parse a vehicle log. Malformed entries are logged and dropped; a payload
/// that is not a log at all is a [`CoreError::MalformedInput`].
pub fn parse_vehicle_log(activity_value_id: i64, raw: &str) -> Result<Vec<VehicleEntry>, CoreError> {
    let payload: Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::MalformedInput(format!("vehicle log is not JSON: {e}")))?;

    let items = match &payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("vehicles") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(CoreError::MalformedInput(
                    "vehicle log object has no 'vehicles' array".into(),
                ))
            }
        },
        _ => {
            return Err(CoreError::MalformedInput(
                "vehicle log must be an array or an object".into(),
            ))
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match parse_entry(index, item) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                tracing::warn!(activity_value_id, index, %reason, "Skipping vehicle entry");
            }
        }
    }
    Ok(entries)
}

fn parse_entry(index: usize, item: &Value) -> Result<VehicleEntry, String> {
    let obj = item.as_object().ok_or("entry is not an object")?;

    let vehicle_type = text_field(obj, &["vehicle_type"]).ok_or("missing vehicle_type")?;
    let fuel_type = text_field(obj, &["fuel_type"]).ok_or("missing fuel_type")?;
    let fuel_consumed =
        number_field(obj, &["fuel_consumed", "fuel"])?.ok_or("missing fuel_consumed")?;
    if fuel_consumed < 0.0 {
        return Err(format!("negative fuel_consumed {fuel_consumed}"));
    }
    let distance = number_field(obj, &["kilometers", "distance"]).unwrap_or(None);
    let registration = text_field(obj, &["registration_number", "registration"]);

    Ok(VehicleEntry {
        index,
        vehicle_type,
        fuel_type,
        fuel_consumed,
        distance,
        registration,
    })
}

fn text_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number_field(
    obj: &serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<Option<f64>, String> {
    let Some(value) = keys
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
    else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("'{value}' is not a number")),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VehicleTrackingStrategy;

#[async_trait]
impl CalculationStrategy for VehicleTrackingStrategy {
    fn name(&self) -> &'static str {
        "vehicle_tracking"
    }

    async fn calculate(
        &self,
        ctx: &StrategyContext<'_>,
        activity: &ActivityValue,
        metric: &Metric,
        year: i32,
        region: Option<&str>,
    ) -> Result<Vec<CalculationResult>, CoreError> {
        let default_config = VehicleTrackingConfig::default();
        let config = metric.vehicle_config().unwrap_or(&default_config);

        let Some(raw) = activity.text_value.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        let entries = match parse_vehicle_log(activity.id, raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(activity_value_id = activity.id, error = %e, "Unreadable vehicle log");
                return Ok(Vec::new());
            }
        };

        // A category on the metric itself wins over the vehicle config default.
        let category = metric
            .emission_category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(config.emission_category.as_str());

        let total_fuel: f64 = entries.iter().map(|e| e.fuel_consumed).sum();
        if total_fuel <= 0.0 {
            tracing::debug!(activity_value_id = activity.id, "Vehicle log has no fuel consumed");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries.iter().filter(|e| e.fuel_consumed > 0.0) {
            let sub_category = config.sub_category_for(&entry.vehicle_type, &entry.fuel_type);
            let lookup = FactorLookup {
                year,
                category: category.to_string(),
                sub_category: sub_category.clone(),
                activity_unit: Some(ctx.config.vehicle_fuel_unit.clone()),
                region: region.map(String::from),
                scope: metric.scope,
            };
            let Some(factor) = ctx.resolver.find_matching_factor(&lookup).await? else {
                tracing::warn!(
                    activity_value_id = activity.id,
                    index = entry.index,
                    vehicle_type = %entry.vehicle_type,
                    fuel_type = %entry.fuel_type,
                    %sub_category,
                    "No emission factor for vehicle entry, skipping"
                );
                continue;
            };

            let mut metadata = CalculationMetadata {
                vehicle_type: Some(entry.vehicle_type.clone()),
                vehicle_label: Some(config.vehicle_label(&entry.vehicle_type)),
                fuel_type: Some(entry.fuel_type.clone()),
                fuel_label: Some(config.fuel_label(&entry.fuel_type)),
                distance: entry.distance,
                registration: entry.registration.clone(),
                ..Default::default()
            };
            metadata
                .extra
                .insert("sub_category".into(), Value::String(sub_category));

            results.push(CalculationResult {
                emission_value: entry.fuel_consumed * factor.value,
                factor,
                activity_value: entry.fuel_consumed,
                proportion: 0.0,
                metadata,
                sub_entity_key: Some(entry.sub_entity_key()),
            });
        }

        // Shares are taken over the fuel that produced a result so a group's
        // proportions always sum to 1.0.
        let resolved_fuel: f64 = results.iter().map(|r| r.activity_value).sum();
        if resolved_fuel > 0.0 {
            for r in &mut results {
                r.proportion = r.activity_value / resolved_fuel;
            }
        }
        Ok(results)
    }
}
