//! Single value, single factor.

use async_trait::async_trait;

use crate::activity::ActivityValue;
use crate::emission::{CalculationMetadata, CalculationResult};
use crate::error::CoreError;
use crate::metric::Metric;
use crate::resolver::{FactorLookup, FactorResolver};

use super::{CalculationStrategy, StrategyContext};

/// Multiplies the activity value by one factor resolved from the metric's
/// emission configuration. Also the fallback for unregistered metric types.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicStrategy;

#[async_trait]
impl CalculationStrategy for BasicStrategy {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn calculate(
        &self,
        ctx: &StrategyContext<'_>,
        activity: &ActivityValue,
        metric: &Metric,
        year: i32,
        region: Option<&str>,
    ) -> Result<Vec<CalculationResult>, CoreError> {
        Ok(single_factor_result(ctx.resolver, activity, metric, year, region)
            .await?
            .into_iter()
            .collect())
    }
}

/// The shared single-factor calculation used by basic-like strategies.
pub(crate) async fn single_factor_result(
    resolver: &FactorResolver,
    activity: &ActivityValue,
    metric: &Metric,
    year: i32,
    region: Option<&str>,
) -> Result<Option<CalculationResult>, CoreError> {
    let Some(value) = activity.usable_numeric_value() else {
        return Ok(None);
    };
    let Some((category, sub_category)) = metric.emission_config() else {
        return Ok(None);
    };

    let lookup = FactorLookup {
        year,
        category: category.to_string(),
        sub_category: sub_category.to_string(),
        activity_unit: metric.activity_unit.clone(),
        region: region.map(String::from),
        scope: metric.scope,
    };

    let Some(factor) = resolver.find_matching_factor(&lookup).await? else {
        tracing::warn!(
            activity_value_id = activity.id,
            metric_id = metric.id,
            year,
            category,
            sub_category,
            region = ?region,
            "No emission factor found, skipping calculation"
        );
        return Ok(None);
    };

    Ok(Some(CalculationResult {
        emission_value: value * factor.value,
        factor,
        activity_value: value,
        proportion: 1.0,
        metadata: CalculationMetadata::default(),
        sub_entity_key: None,
    }))
}
