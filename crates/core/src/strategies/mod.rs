//! Per-metric-type calculation strategies.
//!
//! A strategy turns one activity value into zero or more
//! [`CalculationResult`]s. Expected "no data" conditions (no numeric value,
//! no factor, empty vehicle log) produce an empty list, never an error.

use async_trait::async_trait;

use crate::activity::ActivityValue;
use crate::config::EngineConfig;
use crate::emission::CalculationResult;
use crate::error::CoreError;
use crate::metric::Metric;
use crate::resolver::FactorResolver;

pub mod basic;
pub mod registry;
pub mod time_series;
pub mod vehicle;

pub use basic::BasicStrategy;
pub use registry::StrategyRegistry;
pub use time_series::TimeSeriesStrategy;
pub use vehicle::VehicleTrackingStrategy;

/// Shared collaborators handed to every strategy call.
pub struct StrategyContext<'a> {
    pub resolver: &'a FactorResolver,
    pub config: &'a EngineConfig,
}

/// Converts one activity value into calculation results.
#[async_trait]
pub trait CalculationStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Calculate emissions for `activity` using factors for `year` and
    /// `region`.
    async fn calculate(
        &self,
        ctx: &StrategyContext<'_>,
        activity: &ActivityValue,
        metric: &Metric,
        year: i32,
        region: Option<&str>,
    ) -> Result<Vec<CalculationResult>, CoreError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use crate::activity::{ActivityValue, AggregationLevel};
    use crate::config::EngineConfig;
    use crate::factor::EmissionFactor;
    use crate::factor_table::FactorTable;
    use crate::metric::{Metric, MetricKind};
    use crate::resolver::FactorResolver;
    use crate::types::DbId;

    pub fn factor(id: DbId, category: &str, sub: &str, unit: &str, value: f64) -> EmissionFactor {
        EmissionFactor {
            id,
            year: 2023,
            category: category.into(),
            sub_category: sub.into(),
            activity_unit: unit.into(),
            value,
            factor_unit: format!("kgCO2e/{unit}"),
            region: None,
            scope: Some(1),
            source: None,
        }
    }

    pub fn resolver(factors: Vec<EmissionFactor>) -> FactorResolver {
        let config = EngineConfig::default();
        FactorResolver::new(Arc::new(FactorTable::new(factors)), config.region_groups)
    }

    pub fn metric(kind: MetricKind) -> Metric {
        Metric {
            id: 10,
            name: "Fuel use".into(),
            kind,
            emission_category: Some("stationary".into()),
            emission_sub_category: Some("diesel".into()),
            activity_unit: Some("L".into()),
            location: None,
            scope: Some(1),
        }
    }

    pub fn activity(numeric: Option<f64>, text: Option<&str>) -> ActivityValue {
        ActivityValue {
            id: 100,
            metric_id: 10,
            layer_id: 3,
            assignment_id: Some(5),
            reporting_period: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
            level: AggregationLevel::Annual,
            numeric_value: numeric,
            text_value: text.map(String::from),
        }
    }
}
