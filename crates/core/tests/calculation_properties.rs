//! End-to-end tests of the emission calculator against in-memory stores.
//!
//! Covers:
//! - Idempotent recalculation
//! - Primary/component sum invariant and proportions
//! - Single-result primary records
//! - Skipping when no factor resolves
//! - The three-vehicle composite example
//! - Batch resilience and fatal error propagation
//! - Orphan cleanup in `recalculate_all`
//! - Which text-only values reach a batch
//! - Strategy registration

use std::collections::HashMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use esg_core::activity::{ActivityValue, AggregationLevel, PeriodFilter};
use esg_core::config::EngineConfig;
use esg_core::emission::{CalculatedEmission, CalculationResult, NewCalculatedEmission};
use esg_core::factor::EmissionFactor;
use esg_core::factor_table::FactorTable;
use esg_core::memory::InMemoryStore;
use esg_core::metric::{
    Metric, MetricKind, MetricType, VehicleTrackingConfig, DEFAULT_VEHICLE_CATEGORY,
};
use esg_core::resolver::FactorLookup;
use esg_core::store::{ActivityStore, EmissionStore, FactorStore};
use esg_core::strategies::{BasicStrategy, CalculationStrategy, StrategyContext, StrategyRegistry};
use esg_core::types::DbId;
use esg_core::{CoreError, EmissionCalculator};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BASIC_METRIC: DbId = 1;
const VEHICLE_METRIC: DbId = 2;
const UNCONFIGURED_METRIC: DbId = 3;

fn factor(id: DbId, category: &str, sub: &str, unit: &str, value: f64) -> EmissionFactor {
    EmissionFactor {
        id,
        year: 2023,
        category: category.into(),
        sub_category: sub.into(),
        activity_unit: unit.into(),
        value,
        factor_unit: format!("kgCO2e/{unit}"),
        region: Some("ALL".into()),
        scope: Some(1),
        source: None,
    }
}

fn factors() -> Vec<EmissionFactor> {
    vec![
        factor(1, "stationary", "diesel", "L", 2.68),
        factor(2, "transport", "diesel", "L", 2.70),
        factor(3, "transport", "petrol", "L", 2.40),
        factor(4, "transport", "diesel_commercial", "L", 2.90),
    ]
}

fn basic_metric(id: DbId, sub_category: &str) -> Metric {
    Metric {
        id,
        name: format!("Metric {id}"),
        kind: MetricKind::Basic,
        emission_category: Some("stationary".into()),
        emission_sub_category: Some(sub_category.into()),
        activity_unit: Some("L".into()),
        location: Some("HK".into()),
        scope: Some(1),
    }
}

fn vehicle_metric() -> Metric {
    Metric {
        id: VEHICLE_METRIC,
        name: "Fleet fuel".into(),
        kind: MetricKind::VehicleTracking(VehicleTrackingConfig {
            emission_mapping: HashMap::from([
                ("car_diesel".to_string(), "diesel".to_string()),
                ("car_petrol".to_string(), "petrol".to_string()),
                ("truck_diesel".to_string(), "diesel_commercial".to_string()),
            ]),
            vehicle_type_choices: vec![],
            fuel_type_choices: vec![],
            emission_category: DEFAULT_VEHICLE_CATEGORY.into(),
        }),
        emission_category: None,
        emission_sub_category: None,
        activity_unit: None,
        location: Some("HK".into()),
        scope: Some(1),
    }
}

const VEHICLE_LOG: &str = r#"[
    {"vehicle_type": "car", "fuel_type": "diesel", "fuel_consumed": 100, "kilometers": 1200},
    {"vehicle_type": "car", "fuel_type": "petrol", "fuel_consumed": 120, "kilometers": 1500},
    {"vehicle_type": "truck", "fuel_type": "diesel", "fuel_consumed": 200, "registration_number": "HGV 9"}
]"#;

fn activity(id: DbId, metric_id: DbId, numeric: Option<f64>, text: Option<&str>) -> ActivityValue {
    ActivityValue {
        id,
        metric_id,
        layer_id: 11,
        assignment_id: Some(500),
        reporting_period: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        level: AggregationLevel::Annual,
        numeric_value: numeric,
        text_value: text.map(String::from),
    }
}

async fn setup() -> (EmissionCalculator, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    store.insert_metric(basic_metric(BASIC_METRIC, "diesel")).await;
    store.insert_metric(vehicle_metric()).await;
    let mut unconfigured = basic_metric(UNCONFIGURED_METRIC, "diesel");
    unconfigured.emission_category = None;
    store.insert_metric(unconfigured).await;

    let calculator = EmissionCalculator::new(
        Arc::new(FactorTable::new(factors())),
        store.clone(),
        store.clone(),
        EngineConfig::default(),
    );
    (calculator, store)
}

fn shape(records: &[CalculatedEmission]) -> Vec<(DbId, bool, bool, i64)> {
    let mut s: Vec<_> = records
        .iter()
        .map(|r| {
            (
                r.emission_factor_id,
                r.is_primary_record,
                r.group_id.is_some(),
                (r.calculated_value * 1000.0).round() as i64,
            )
        })
        .collect();
    s.sort();
    s
}

// ---------------------------------------------------------------------------
// Single-value calculations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_result_is_primary_without_group() {
    let (calc, _store) = setup().await;
    let value = activity(10, BASIC_METRIC, Some(1000.0), None);

    let records = calc.calculate_for_activity_value(&value).await.unwrap();

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert!(r.is_primary_record);
    assert_eq!(r.group_id, None);
    assert_eq!(r.proportion, 1.0);
    assert_eq!(r.emission_factor_id, 1);
    assert_eq!(r.emission_unit, "kgCO2e");
    assert!((r.calculated_value - 2680.0).abs() < 1e-6);
    assert_eq!(r.layer_id, 11);
    assert_eq!(r.assignment_id, Some(500));
    assert_eq!(r.scope, Some(1));
}

#[tokio::test]
async fn recalculation_is_idempotent() {
    let (calc, store) = setup().await;
    let basic = activity(10, BASIC_METRIC, Some(50.0), None);
    let fleet = activity(11, VEHICLE_METRIC, None, Some(VEHICLE_LOG));

    let first_basic = calc.calculate_for_activity_value(&basic).await.unwrap();
    let first_fleet = calc.calculate_for_activity_value(&fleet).await.unwrap();
    let second_basic = calc.calculate_for_activity_value(&basic).await.unwrap();
    let second_fleet = calc.calculate_for_activity_value(&fleet).await.unwrap();

    assert_eq!(shape(&first_basic), shape(&second_basic));
    assert_eq!(shape(&first_fleet), shape(&second_fleet));
    assert_eq!(store.all_emissions().await.len(), 1 + 4);
}

#[tokio::test]
async fn missing_factor_produces_nothing_and_clears_old_records() {
    let (calc, store) = setup().await;
    store.insert_metric(basic_metric(BASIC_METRIC, "diesel")).await;
    let value = activity(10, BASIC_METRIC, Some(50.0), None);
    calc.calculate_for_activity_value(&value).await.unwrap();
    assert_eq!(store.all_emissions().await.len(), 1);

    // The metric now points at a sub-category with no factor anywhere.
    store.insert_metric(basic_metric(BASIC_METRIC, "biogas")).await;
    let records = calc.calculate_for_activity_value(&value).await.unwrap();

    assert!(records.is_empty());
    assert!(store.all_emissions().await.is_empty());
}

#[tokio::test]
async fn text_only_basic_value_is_skipped() {
    let (calc, store) = setup().await;
    let value = activity(10, BASIC_METRIC, None, Some("see attached invoice"));

    assert!(calc.calculate_for_activity_value(&value).await.unwrap().is_empty());
    assert!(store.all_emissions().await.is_empty());
}

#[tokio::test]
async fn metric_without_category_is_skipped() {
    let (calc, _store) = setup().await;
    let value = activity(10, UNCONFIGURED_METRIC, Some(50.0), None);
    assert!(calc.calculate_for_activity_value(&value).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_metric_is_not_found() {
    let (calc, _store) = setup().await;
    let value = activity(10, 999, Some(50.0), None);
    let err = calc.calculate_for_activity_value(&value).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { entity: "metric", id: 999 });
}

// ---------------------------------------------------------------------------
// Composite calculations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vehicle_composite_example() {
    let (calc, _store) = setup().await;
    let value = activity(20, VEHICLE_METRIC, None, Some(VEHICLE_LOG));

    let records = calc.calculate_for_activity_value(&value).await.unwrap();
    assert_eq!(records.len(), 4);

    let components: Vec<&CalculatedEmission> =
        records.iter().filter(|r| !r.is_primary_record).collect();
    let primaries: Vec<&CalculatedEmission> =
        records.iter().filter(|r| r.is_primary_record).collect();
    assert_eq!(components.len(), 3);
    assert_eq!(primaries.len(), 1);

    let expected = [(2, 270.0, 100.0), (3, 288.0, 120.0), (4, 580.0, 200.0)];
    for (factor_id, value, fuel) in expected {
        let c = components
            .iter()
            .find(|c| c.emission_factor_id == factor_id)
            .unwrap_or_else(|| panic!("missing component for factor {factor_id}"));
        assert!((c.calculated_value - value).abs() < 1e-9);
        assert!((c.proportion - fuel / 420.0).abs() < 1e-12);
    }

    let primary = primaries[0];
    assert!((primary.calculated_value - 1138.0).abs() < 1e-9);
    assert_eq!(primary.proportion, 1.0);
    assert_eq!(primary.metadata.is_composite, Some(true));
    assert_eq!(primary.metadata.component_count, Some(3));
}

#[tokio::test]
async fn group_sum_invariant_holds() {
    let (calc, _store) = setup().await;
    let value = activity(20, VEHICLE_METRIC, None, Some(VEHICLE_LOG));
    let records = calc.calculate_for_activity_value(&value).await.unwrap();

    let group = records[0].group_id.expect("composite records are grouped");
    assert!(records.iter().all(|r| r.group_id == Some(group)));

    let component_sum: f64 = records
        .iter()
        .filter(|r| !r.is_primary_record)
        .map(|r| r.calculated_value)
        .sum();
    let proportion_sum: f64 = records
        .iter()
        .filter(|r| !r.is_primary_record)
        .map(|r| r.proportion)
        .sum();
    let primary = records.iter().find(|r| r.is_primary_record).unwrap();

    assert!((primary.calculated_value - component_sum).abs() < 1e-9);
    assert!((proportion_sum - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn vehicle_log_with_single_resolvable_entry_is_plain_primary() {
    let (calc, _store) = setup().await;
    let log = r#"[{"vehicle_type": "car", "fuel_type": "diesel", "fuel_consumed": 10},
                  {"vehicle_type": "boat", "fuel_type": "hydrogen", "fuel_consumed": 5}]"#;
    let value = activity(20, VEHICLE_METRIC, None, Some(log));

    let records = calc.calculate_for_activity_value(&value).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_primary_record);
    assert_eq!(records[0].group_id, None);
    assert!((records[0].calculated_value - 27.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Batch drivers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_counts_unresolvable_values_as_failed() {
    let (calc, store) = setup().await;
    store
        .insert_metric(basic_metric(40, "no_such_fuel"))
        .await;

    for id in 1..=8 {
        store
            .insert_activity(activity(id, BASIC_METRIC, Some(id as f64), None))
            .await;
    }
    store.insert_activity(activity(9, 40, Some(1.0), None)).await;
    store.insert_activity(activity(10, 40, Some(2.0), None)).await;

    let summary = calc
        .calculate_for_assignment(500, &PeriodFilter::default())
        .await
        .unwrap();

    assert_eq!(summary.processed, 10);
    assert_eq!(summary.succeeded, 8);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.primary_records, 8);
    assert_eq!(summary.component_records, 0);

    for id in 1..=8 {
        let records = store.list_for_source(id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].calculated_value - id as f64 * 2.68).abs() < 1e-9);
    }
}

#[tokio::test]
async fn assignment_filter_restricts_period() {
    let (calc, store) = setup().await;
    let mut march = activity(1, BASIC_METRIC, Some(1.0), None);
    march.reporting_period = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();
    march.level = AggregationLevel::Monthly;
    let mut april = activity(2, BASIC_METRIC, Some(1.0), None);
    april.reporting_period = NaiveDate::from_ymd_opt(2023, 4, 30).unwrap();
    april.level = AggregationLevel::Monthly;
    store.insert_activity(march).await;
    store.insert_activity(april).await;

    let filter = PeriodFilter {
        year: Some(2023),
        month: Some(4),
        ..Default::default()
    };
    let summary = calc.calculate_for_assignment(500, &filter).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert!(store.list_for_source(1).await.unwrap().is_empty());
    assert_eq!(store.list_for_source(2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn text_only_values_reach_the_batch_only_for_vehicle_metrics() {
    let (calc, store) = setup().await;
    store
        .insert_activity(activity(1, BASIC_METRIC, None, Some("see attached invoice")))
        .await;
    store
        .insert_activity(activity(2, VEHICLE_METRIC, None, Some(VEHICLE_LOG)))
        .await;
    store
        .insert_activity(activity(3, BASIC_METRIC, Some(10.0), None))
        .await;
    store.insert_activity(activity(4, 999, None, Some("orphan"))).await;

    let listed: Vec<DbId> = store
        .list_for_assignment(500, &PeriodFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(listed, vec![2, 3]);

    let summary = calc
        .calculate_for_assignment(500, &PeriodFilter::default())
        .await
        .unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);

    let all = calc.recalculate_all().await.unwrap();
    assert_eq!(all.processed, 2);
    assert_eq!(all.failed, 0);
}

#[tokio::test]
async fn recalculate_all_deletes_orphans() {
    let (calc, store) = setup().await;
    store
        .insert_activity(activity(1, BASIC_METRIC, Some(5.0), None))
        .await;
    store
        .insert_activity(activity(2, VEHICLE_METRIC, None, Some(VEHICLE_LOG)))
        .await;
    let first = calc.recalculate_all().await.unwrap();
    assert_eq!(first.primary_records, 2);
    assert_eq!(first.component_records, 3);
    assert_eq!(first.orphans_deleted, 0);

    store.remove_activity(2).await;
    let second = calc.recalculate_all().await.unwrap();

    assert_eq!(second.processed, 1);
    assert_eq!(second.orphans_deleted, 4);
    let remaining = store.all_emissions().await;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|r| r.source_activity_value_id == 1));
}

/// Emission store that fails for chosen sources and delegates otherwise.
struct FlakyStore {
    inner: Arc<InMemoryStore>,
    broken: Vec<DbId>,
    fatal: bool,
}

#[async_trait]
impl EmissionStore for FlakyStore {
    async fn replace_for_source(
        &self,
        source_id: DbId,
        records: Vec<NewCalculatedEmission>,
    ) -> Result<Vec<CalculatedEmission>, CoreError> {
        if self.broken.contains(&source_id) {
            return Err(if self.fatal {
                CoreError::Transaction("could not begin transaction".into())
            } else {
                CoreError::Storage("insert failed".into())
            });
        }
        self.inner.replace_for_source(source_id, records).await
    }

    async fn delete_for_source(&self, source_id: DbId) -> Result<u64, CoreError> {
        self.inner.delete_for_source(source_id).await
    }

    async fn delete_orphans(&self) -> Result<u64, CoreError> {
        self.inner.delete_orphans().await
    }

    async fn list_for_source(&self, source_id: DbId) -> Result<Vec<CalculatedEmission>, CoreError> {
        self.inner.list_for_source(source_id).await
    }
}

async fn flaky_setup(fatal: bool) -> (EmissionCalculator, Arc<InMemoryStore>) {
    let (_, store) = setup().await;
    for id in 1..=4 {
        store
            .insert_activity(activity(id, BASIC_METRIC, Some(1.0), None))
            .await;
    }
    let factors: Arc<dyn FactorStore> = Arc::new(FactorTable::new(factors()));
    let calc = EmissionCalculator::new(
        factors,
        store.clone(),
        Arc::new(FlakyStore {
            inner: store.clone(),
            broken: vec![2],
            fatal,
        }),
        EngineConfig::default(),
    );
    (calc, store)
}

#[tokio::test]
async fn storage_errors_do_not_abort_the_batch() {
    let (calc, store) = flaky_setup(false).await;

    let summary = calc.recalculate_all().await.unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(store.list_for_source(4).await.unwrap().len(), 1);
}

#[tokio::test]
async fn transaction_errors_abort_the_batch() {
    let (calc, store) = flaky_setup(true).await;

    let err = calc.recalculate_all().await.unwrap_err();

    assert_matches!(err, CoreError::Transaction(_));
    assert_eq!(store.list_for_source(1).await.unwrap().len(), 1);
    assert!(store.list_for_source(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_month_is_rejected_before_work() {
    let (calc, _store) = setup().await;
    let filter = PeriodFilter {
        month: Some(0),
        ..Default::default()
    };
    let err = calc.calculate_for_assignment(500, &filter).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

// ---------------------------------------------------------------------------
// Strategy registration
// ---------------------------------------------------------------------------

/// Basic arithmetic, halved.
struct HalvingStrategy;

#[async_trait]
impl CalculationStrategy for HalvingStrategy {
    fn name(&self) -> &'static str {
        "halving"
    }

    async fn calculate(
        &self,
        ctx: &StrategyContext<'_>,
        activity: &ActivityValue,
        metric: &Metric,
        year: i32,
        region: Option<&str>,
    ) -> Result<Vec<CalculationResult>, CoreError> {
        let mut results = BasicStrategy
            .calculate(ctx, activity, metric, year, region)
            .await?;
        for r in &mut results {
            r.emission_value /= 2.0;
        }
        Ok(results)
    }
}

#[tokio::test]
async fn registered_strategy_handles_its_metric_type() {
    let (calc, store) = setup().await;
    let mut tabular = basic_metric(50, "diesel");
    tabular.kind = MetricKind::Tabular;
    store.insert_metric(tabular).await;

    let mut registry = StrategyRegistry::default();
    registry.register(MetricType::Tabular, Arc::new(HalvingStrategy));
    let calc = calc.with_registry(registry);

    let tabular_value = activity(1, 50, Some(100.0), None);
    let records = calc.calculate_for_activity_value(&tabular_value).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!((records[0].calculated_value - 134.0).abs() < 1e-9);

    // Other types keep their default strategy.
    let basic_value = activity(2, BASIC_METRIC, Some(100.0), None);
    let records = calc.calculate_for_activity_value(&basic_value).await.unwrap();
    assert!((records[0].calculated_value - 268.0).abs() < 1e-9);
}

#[tokio::test]
async fn calculator_exposes_its_resolver() {
    let (calc, _store) = setup().await;
    let lookup = FactorLookup {
        year: 2024,
        category: "transport".into(),
        sub_category: "petrol".into(),
        activity_unit: Some("L".into()),
        region: Some("HK".into()),
        scope: None,
    };

    let factor = calc.resolver().find_matching_factor(&lookup).await.unwrap();
    assert_eq!(factor.map(|f| (f.id, f.year)), Some((3, 2023)));
}
