//! Emission calculator: strategy dispatch, primary/component bookkeeping
//! and persistence of calculated emission values.
//!
//! Every activity value is processed as one unit of work. Its previous
//! records are replaced atomically through
//! [`EmissionStore::replace_for_source`], so re-running a calculation or a
//! whole batch is idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::activity::{ActivityValue, PeriodFilter};
use crate::config::EngineConfig;
use crate::emission::{
    CalculatedEmission, CalculationMetadata, CalculationResult, NewCalculatedEmission,
};
use crate::error::CoreError;
use crate::metric::Metric;
use crate::resolver::FactorResolver;
use crate::store::{ActivityStore, EmissionStore, FactorStore};
use crate::strategies::{StrategyContext, StrategyRegistry};
use crate::types::{DbId, Scope};

// ---------------------------------------------------------------------------
// Batch summary
// ---------------------------------------------------------------------------

/// Outcome counts of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    /// Activity values that produced at least one record.
    pub succeeded: usize,
    /// Activity values that produced no record, for any reason.
    pub failed: usize,
    /// Subset of `failed` caused by an error rather than missing data.
    pub errors: usize,
    pub primary_records: usize,
    pub component_records: usize,
    pub orphans_deleted: u64,
}

impl BatchSummary {
    fn record(&mut self, records: &[CalculatedEmission]) {
        self.succeeded += 1;
        for r in records {
            if r.is_primary_record {
                self.primary_records += 1;
            } else {
                self.component_records += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Record building
// ---------------------------------------------------------------------------

/// Turn strategy results into records to persist.
///
/// One result becomes a single primary record without a group id. Several
/// results become non-primary components sharing `group_id`, followed by a
/// primary record carrying their sum.
pub fn build_records(
    source: &ActivityValue,
    metric_scope: Option<Scope>,
    results: &[CalculationResult],
    group_id: Uuid,
) -> Vec<NewCalculatedEmission> {
    match results {
        [] => Vec::new(),
        [single] => vec![NewCalculatedEmission::from_result(
            source,
            single,
            metric_scope,
            None,
            true,
        )],
        [first, ..] => {
            let mut records: Vec<NewCalculatedEmission> = results
                .iter()
                .map(|r| {
                    NewCalculatedEmission::from_result(source, r, metric_scope, Some(group_id), false)
                })
                .collect();

            let units = distinct_emission_units(results);
            if units.len() > 1 {
                tracing::warn!(
                    activity_value_id = source.id,
                    units = ?units,
                    "Composite components use different emission units; primary keeps the first"
                );
            }

            let total: f64 = results.iter().map(|r| r.emission_value).sum();
            let mut primary =
                NewCalculatedEmission::from_result(source, first, metric_scope, Some(group_id), true);
            primary.calculated_value = total;
            primary.proportion = 1.0;
            primary.metadata = CalculationMetadata::composite(results.len());
            primary.sub_entity_key = None;
            records.push(primary);
            records
        }
    }
}

/// Emission units of `results` in first-seen order, without duplicates.
fn distinct_emission_units(results: &[CalculationResult]) -> Vec<String> {
    let mut units: Vec<String> = Vec::new();
    for unit in results.iter().map(|r| r.factor.emission_unit()) {
        if !units.contains(&unit) {
            units.push(unit);
        }
    }
    units
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Orchestrates emission calculation for activity values.
#[derive(Clone)]
pub struct EmissionCalculator {
    resolver: FactorResolver,
    registry: StrategyRegistry,
    config: EngineConfig,
    activities: Arc<dyn ActivityStore>,
    emissions: Arc<dyn EmissionStore>,
}

impl EmissionCalculator {
    pub fn new(
        factors: Arc<dyn FactorStore>,
        activities: Arc<dyn ActivityStore>,
        emissions: Arc<dyn EmissionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver: FactorResolver::new(factors, config.region_groups.clone()),
            registry: StrategyRegistry::default(),
            config,
            activities,
            emissions,
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// A calculator identical to this one but reading factors from `factors`.
    pub fn with_factor_store(&self, factors: Arc<dyn FactorStore>) -> Self {
        Self {
            resolver: FactorResolver::new(factors, self.config.region_groups.clone()),
            ..self.clone()
        }
    }

    pub fn resolver(&self) -> &FactorResolver {
        &self.resolver
    }

    /// Calculate and persist emissions for one activity value.
    ///
    /// Returns the persisted records (primary last for composites), or an
    /// empty list when there is nothing to calculate.
    pub async fn calculate_for_activity_value(
        &self,
        activity: &ActivityValue,
    ) -> Result<Vec<CalculatedEmission>, CoreError> {
        let metric = self
            .activities
            .find_metric(activity.metric_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "metric",
                id: activity.metric_id,
            })?;
        self.calculate_with_metric(activity, &metric).await
    }

    /// Same as [`calculate_for_activity_value`](Self::calculate_for_activity_value)
    /// with the metric already loaded.
    pub async fn calculate_with_metric(
        &self,
        activity: &ActivityValue,
        metric: &Metric,
    ) -> Result<Vec<CalculatedEmission>, CoreError> {
        let metric_type = metric.metric_type();

        if activity.usable_numeric_value().is_none() && !metric_type.reads_structured_text() {
            tracing::debug!(
                activity_value_id = activity.id,
                %metric_type,
                "No numeric value, skipping"
            );
            return Ok(Vec::new());
        }
        if metric.emission_config().is_none() && !metric_type.derives_emission_category() {
            tracing::debug!(
                activity_value_id = activity.id,
                metric_id = metric.id,
                %metric_type,
                "Metric has no emission category, skipping"
            );
            return Ok(Vec::new());
        }

        let strategy = self.registry.get_strategy(metric);
        let ctx = StrategyContext {
            resolver: &self.resolver,
            config: &self.config,
        };
        let results = strategy
            .calculate(
                &ctx,
                activity,
                metric,
                activity.year(),
                metric.location.as_deref(),
            )
            .await?;

        if results.is_empty() {
            let removed = self.emissions.delete_for_source(activity.id).await?;
            tracing::warn!(
                activity_value_id = activity.id,
                %metric_type,
                strategy = strategy.name(),
                removed,
                "Calculation produced no results"
            );
            return Ok(Vec::new());
        }

        let records = build_records(activity, metric.scope, &results, Uuid::new_v4());
        let saved = self.emissions.replace_for_source(activity.id, records).await?;
        tracing::debug!(
            activity_value_id = activity.id,
            %metric_type,
            records = saved.len(),
            "Emissions calculated"
        );
        Ok(saved)
    }

    /// Recalculate every eligible activity value of an assignment.
    pub async fn calculate_for_assignment(
        &self,
        assignment_id: DbId,
        filter: &PeriodFilter,
    ) -> Result<BatchSummary, CoreError> {
        filter.validate()?;
        let values = self
            .activities
            .list_for_assignment(assignment_id, filter)
            .await?;
        tracing::info!(assignment_id, count = values.len(), "Calculating assignment emissions");

        let summary = self.run_batch(&values).await?;
        tracing::info!(
            assignment_id,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Assignment calculation finished"
        );
        Ok(summary)
    }

    /// Recalculate every eligible activity value, then delete records whose
    /// source no longer exists.
    pub async fn recalculate_all(&self) -> Result<BatchSummary, CoreError> {
        let values = self.activities.list_all().await?;
        tracing::info!(count = values.len(), "Recalculating all emissions");

        let mut summary = self.run_batch(&values).await?;
        summary.orphans_deleted = self.emissions.delete_orphans().await?;
        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            errors = summary.errors,
            primary_records = summary.primary_records,
            component_records = summary.component_records,
            orphans_deleted = summary.orphans_deleted,
            "Full recalculation finished"
        );
        Ok(summary)
    }

    async fn run_batch(&self, values: &[ActivityValue]) -> Result<BatchSummary, CoreError> {
        let mut summary = BatchSummary::default();
        let mut metrics: HashMap<DbId, Option<Metric>> = HashMap::new();

        for activity in values {
            summary.processed += 1;

            let outcome = match self.cached_metric(&mut metrics, activity.metric_id).await {
                Ok(Some(metric)) => self.calculate_with_metric(activity, &metric).await,
                Ok(None) => Err(CoreError::NotFound {
                    entity: "metric",
                    id: activity.metric_id,
                }),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(records) if !records.is_empty() => summary.record(&records),
                Ok(_) => summary.failed += 1,
                Err(e) if e.is_fatal() => {
                    tracing::error!(
                        activity_value_id = activity.id,
                        error = %e,
                        "Aborting batch"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let metric_type = metrics
                        .get(&activity.metric_id)
                        .and_then(|m| m.as_ref())
                        .map(|m| m.metric_type().as_str())
                        .unwrap_or("unknown");
                    tracing::error!(
                        activity_value_id = activity.id,
                        metric_id = activity.metric_id,
                        metric_type,
                        error = %e,
                        "Emission calculation failed"
                    );
                    summary.failed += 1;
                    summary.errors += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn cached_metric(
        &self,
        cache: &mut HashMap<DbId, Option<Metric>>,
        metric_id: DbId,
    ) -> Result<Option<Metric>, CoreError> {
        if let Some(hit) = cache.get(&metric_id) {
            return Ok(hit.clone());
        }
        let metric = self.activities.find_metric(metric_id).await?;
        cache.insert(metric_id, metric.clone());
        Ok(metric)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
