//! In-process activity and emission stores.
//!
//! Mirrors the PostgreSQL semantics closely enough for dry runs and tests:
//! replacement is atomic under a single write lock, and the record
//! uniqueness key is enforced.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::activity::{ActivityValue, PeriodFilter};
use crate::emission::{CalculatedEmission, NewCalculatedEmission};
use crate::error::CoreError;
use crate::metric::Metric;
use crate::store::{ActivityStore, EmissionStore};
use crate::types::DbId;

type RecordKey = (DbId, DbId, Option<uuid::Uuid>, bool, Option<String>);

fn record_key(r: &NewCalculatedEmission) -> RecordKey {
    (
        r.source_activity_value_id,
        r.emission_factor_id,
        r.group_id,
        r.is_primary_record,
        r.sub_entity_key.clone(),
    )
}

/// Activity values, metrics and calculated emissions held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    metrics: RwLock<HashMap<DbId, Metric>>,
    activities: RwLock<BTreeMap<DbId, ActivityValue>>,
    emissions: RwLock<Vec<CalculatedEmission>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_metric(&self, metric: Metric) {
        self.metrics.write().await.insert(metric.id, metric);
    }

    pub async fn insert_activity(&self, value: ActivityValue) {
        self.activities.write().await.insert(value.id, value);
    }

    /// Remove an activity value without touching its calculated records.
    pub async fn remove_activity(&self, id: DbId) -> Option<ActivityValue> {
        self.activities.write().await.remove(&id)
    }

    /// Every stored record, in insertion order.
    pub async fn all_emissions(&self) -> Vec<CalculatedEmission> {
        self.emissions.read().await.clone()
    }

    /// Numeric values always qualify; text-only values only for metrics that
    /// read structured text.
    fn eligible(value: &ActivityValue, metrics: &HashMap<DbId, Metric>) -> bool {
        value.numeric_value.is_some()
            || (value.has_text_value()
                && metrics
                    .get(&value.metric_id)
                    .is_some_and(|m| m.metric_type().reads_structured_text()))
    }
}

#[async_trait]
impl ActivityStore for InMemoryStore {
    async fn find_metric(&self, metric_id: DbId) -> Result<Option<Metric>, CoreError> {
        Ok(self.metrics.read().await.get(&metric_id).cloned())
    }

    async fn list_for_assignment(
        &self,
        assignment_id: DbId,
        filter: &PeriodFilter,
    ) -> Result<Vec<ActivityValue>, CoreError> {
        let metrics = self.metrics.read().await;
        let mut values: Vec<ActivityValue> = self
            .activities
            .read()
            .await
            .values()
            .filter(|v| v.assignment_id == Some(assignment_id))
            .filter(|v| Self::eligible(v, &metrics) && filter.matches(v))
            .cloned()
            .collect();
        values.sort_by_key(|v| (v.reporting_period, v.id));
        Ok(values)
    }

    async fn list_all(&self) -> Result<Vec<ActivityValue>, CoreError> {
        let metrics = self.metrics.read().await;
        Ok(self
            .activities
            .read()
            .await
            .values()
            .filter(|v| Self::eligible(v, &metrics))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmissionStore for InMemoryStore {
    async fn replace_for_source(
        &self,
        source_id: DbId,
        records: Vec<NewCalculatedEmission>,
    ) -> Result<Vec<CalculatedEmission>, CoreError> {
        let mut seen = HashSet::with_capacity(records.len());
        for r in &records {
            if r.source_activity_value_id != source_id {
                return Err(CoreError::Validation(format!(
                    "record for source {} passed to replace_for_source({source_id})",
                    r.source_activity_value_id
                )));
            }
            if !seen.insert(record_key(r)) {
                return Err(CoreError::Conflict(format!(
                    "duplicate calculated emission for source {source_id}, factor {}",
                    r.emission_factor_id
                )));
            }
        }

        let mut table = self.emissions.write().await;
        table.retain(|e| e.source_activity_value_id != source_id);

        let now = chrono::Utc::now();
        let saved: Vec<CalculatedEmission> = records
            .into_iter()
            .map(|r| {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                CalculatedEmission::from_new(id, now, r)
            })
            .collect();
        table.extend(saved.iter().cloned());
        Ok(saved)
    }

    async fn delete_for_source(&self, source_id: DbId) -> Result<u64, CoreError> {
        let mut table = self.emissions.write().await;
        let before = table.len();
        table.retain(|e| e.source_activity_value_id != source_id);
        Ok((before - table.len()) as u64)
    }

    async fn delete_orphans(&self) -> Result<u64, CoreError> {
        let activities = self.activities.read().await;
        let mut table = self.emissions.write().await;
        let before = table.len();
        table.retain(|e| activities.contains_key(&e.source_activity_value_id));
        Ok((before - table.len()) as u64)
    }

    async fn list_for_source(&self, source_id: DbId) -> Result<Vec<CalculatedEmission>, CoreError> {
        let mut records: Vec<CalculatedEmission> = self
            .emissions
            .read()
            .await
            .iter()
            .filter(|e| e.source_activity_value_id == source_id)
            .cloned()
            .collect();
        records.sort_by_key(|e| (!e.is_primary_record, e.id));
        Ok(records)
    }
}
