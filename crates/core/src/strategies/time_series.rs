//! Time-series metrics: basic arithmetic plus series metadata.

use async_trait::async_trait;

use crate::activity::ActivityValue;
use crate::emission::CalculationResult;
use crate::error::CoreError;
use crate::metric::{Metric, MetricKind};

use super::basic::single_factor_result;
use super::{CalculationStrategy, StrategyContext};

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeSeriesStrategy;

#[async_trait]
impl CalculationStrategy for TimeSeriesStrategy {
    fn name(&self) -> &'static str {
        "time_series"
    }

    async fn calculate(
        &self,
        ctx: &StrategyContext<'_>,
        activity: &ActivityValue,
        metric: &Metric,
        year: i32,
        region: Option<&str>,
    ) -> Result<Vec<CalculationResult>, CoreError> {
        let Some(mut result) =
            single_factor_result(ctx.resolver, activity, metric, year, region).await?
        else {
            return Ok(Vec::new());
        };

        if let MetricKind::TimeSeries {
            frequency,
            aggregation_method,
        } = &metric.kind
        {
            result.metadata.frequency = Some(frequency.clone());
            result.metadata.aggregation_method = Some(aggregation_method.clone());
        }
        Ok(vec![result])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::strategies::test_support::{activity, factor, metric, resolver};

    #[tokio::test]
    async fn records_series_metadata() {
        let resolver = resolver(vec![factor(1, "stationary", "diesel", "L", 2.0)]);
        let config = EngineConfig::default();
        let ctx = StrategyContext {
            resolver: &resolver,
            config: &config,
        };
        let metric = metric(MetricKind::TimeSeries {
            frequency: "monthly".into(),
            aggregation_method: "sum".into(),
        });

        let results = TimeSeriesStrategy
            .calculate(&ctx, &activity(Some(12.0), None), &metric, 2023, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].emission_value - 24.0).abs() < 1e-9);
        assert_eq!(results[0].metadata.frequency.as_deref(), Some("monthly"));
        assert_eq!(results[0].metadata.aggregation_method.as_deref(), Some("sum"));
    }
}
