//! Lookup table from metric type to calculation strategy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::metric::{Metric, MetricType};

use super::{BasicStrategy, CalculationStrategy, TimeSeriesStrategy, VehicleTrackingStrategy};

/// Maps a [`MetricType`] to its strategy, falling back to [`BasicStrategy`].
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<MetricType, Arc<dyn CalculationStrategy>>,
    fallback: Arc<dyn CalculationStrategy>,
}

impl StrategyRegistry {
    /// An empty registry; every metric resolves to the basic strategy.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: Arc::new(BasicStrategy),
        }
    }

    /// Register (or replace) the strategy for a metric type.
    pub fn register(&mut self, metric_type: MetricType, strategy: Arc<dyn CalculationStrategy>) {
        self.strategies.insert(metric_type, strategy);
    }

    pub fn get_strategy(&self, metric: &Metric) -> &dyn CalculationStrategy {
        self.for_type(metric.metric_type())
    }

    pub fn for_type(&self, metric_type: MetricType) -> &dyn CalculationStrategy {
        self.strategies
            .get(&metric_type)
            .unwrap_or(&self.fallback)
            .as_ref()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(MetricType::Basic, Arc::new(BasicStrategy));
        registry.register(MetricType::TimeSeries, Arc::new(TimeSeriesStrategy));
        registry.register(MetricType::VehicleTracking, Arc::new(VehicleTrackingStrategy));
        registry
    }
}
