//! [`PgStore`]: the `esg-core` store traits backed by PostgreSQL.

use async_trait::async_trait;
use esg_core::activity::{ActivityValue, PeriodFilter};
use esg_core::emission::{CalculatedEmission, NewCalculatedEmission};
use esg_core::factor::{EmissionFactor, FactorCriteria};
use esg_core::factor_table::FactorTable;
use esg_core::metric::Metric;
use esg_core::store::{ActivityStore, EmissionStore, FactorStore};
use esg_core::types::DbId;
use esg_core::CoreError;

use crate::error::{map_db_error, map_tx_error};
use crate::models::activity_value::ActivityValueRow;
use crate::models::calculated_emission::{CalculatedEmissionRow, ScopeTotal};
use crate::models::emission_factor::{CreateEmissionFactor, EmissionFactorRow};
use crate::repositories::{
    ActivityValueRepo, CalculatedEmissionRepo, EmissionFactorRepo, MetricRepo,
};
use crate::DbPool;

/// Store implementation over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Load every factor into an in-memory table.
    pub async fn load_factor_table(&self) -> Result<FactorTable, CoreError> {
        let rows = EmissionFactorRepo::list_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        let table = FactorTable::new(rows.into_iter().map(EmissionFactor::from).collect());
        tracing::info!(factors = table.len(), "Loaded emission factor snapshot");
        Ok(table)
    }

    // -----------------------------------------------------------------------
    // Factor administration
    // -----------------------------------------------------------------------

    /// Validate and insert a factor.
    pub async fn create_factor(
        &self,
        input: &CreateEmissionFactor,
    ) -> Result<EmissionFactor, CoreError> {
        input.validate()?;
        let row = EmissionFactorRepo::create(&self.pool, input)
            .await
            .map_err(map_db_error)?;
        Ok(row.into())
    }

    /// Delete a factor that no calculated emission value references.
    pub async fn delete_factor(&self, id: DbId) -> Result<(), CoreError> {
        if EmissionFactorRepo::is_in_use(&self.pool, id)
            .await
            .map_err(map_db_error)?
        {
            return Err(CoreError::Conflict(format!(
                "Emission factor {id} is referenced by calculated emission values"
            )));
        }
        let deleted = EmissionFactorRepo::delete(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        if !deleted {
            return Err(CoreError::NotFound {
                entity: "emission factor",
                id,
            });
        }
        tracing::info!(factor_id = id, "Emission factor deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Primary-record totals per (scope, unit) for an assignment.
    pub async fn totals_by_scope(
        &self,
        assignment_id: DbId,
        from: Option<chrono::NaiveDate>,
        to: Option<chrono::NaiveDate>,
    ) -> Result<Vec<ScopeTotal>, CoreError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(CoreError::Validation(format!(
                    "Period start {from} is after period end {to}"
                )));
            }
        }
        CalculatedEmissionRepo::totals_by_scope(&self.pool, assignment_id, from, to)
            .await
            .map_err(map_db_error)
    }
}

fn into_activities(rows: Vec<ActivityValueRow>) -> Result<Vec<ActivityValue>, CoreError> {
    rows.into_iter().map(ActivityValue::try_from).collect()
}

fn into_emissions(rows: Vec<CalculatedEmissionRow>) -> Result<Vec<CalculatedEmission>, CoreError> {
    rows.into_iter().map(CalculatedEmission::try_from).collect()
}

#[async_trait]
impl FactorStore for PgStore {
    async fn find_first(
        &self,
        criteria: &FactorCriteria,
    ) -> Result<Option<EmissionFactor>, CoreError> {
        let row: Option<EmissionFactorRow> = EmissionFactorRepo::find_first(&self.pool, criteria)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(EmissionFactor::from))
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn find_metric(&self, metric_id: DbId) -> Result<Option<Metric>, CoreError> {
        MetricRepo::find_by_id(&self.pool, metric_id)
            .await
            .map_err(map_db_error)?
            .map(|row| row.into_metric())
            .transpose()
    }

    async fn list_for_assignment(
        &self,
        assignment_id: DbId,
        filter: &PeriodFilter,
    ) -> Result<Vec<ActivityValue>, CoreError> {
        let rows = ActivityValueRepo::list_for_assignment(&self.pool, assignment_id, filter)
            .await
            .map_err(map_db_error)?;
        into_activities(rows)
    }

    async fn list_all(&self) -> Result<Vec<ActivityValue>, CoreError> {
        let rows = ActivityValueRepo::list_all_eligible(&self.pool)
            .await
            .map_err(map_db_error)?;
        into_activities(rows)
    }
}

#[async_trait]
impl EmissionStore for PgStore {
    async fn replace_for_source(
        &self,
        source_id: DbId,
        records: Vec<NewCalculatedEmission>,
    ) -> Result<Vec<CalculatedEmission>, CoreError> {
        if let Some(stray) = records
            .iter()
            .find(|r| r.source_activity_value_id != source_id)
        {
            return Err(CoreError::Validation(format!(
                "record for source {} passed to replace_for_source({source_id})",
                stray.source_activity_value_id
            )));
        }

        let mut tx = self.pool.begin().await.map_err(map_tx_error)?;
        let removed = CalculatedEmissionRepo::delete_for_source_tx(&mut tx, source_id)
            .await
            .map_err(map_db_error)?;

        let mut saved = Vec::with_capacity(records.len());
        for record in &records {
            // Dropping `tx` on error rolls the replacement back.
            let row = CalculatedEmissionRepo::insert_tx(&mut tx, record)
                .await
                .map_err(map_db_error)?;
            saved.push(row);
        }
        tx.commit().await.map_err(map_tx_error)?;

        tracing::debug!(
            activity_value_id = source_id,
            removed,
            inserted = saved.len(),
            "Replaced calculated emission values"
        );
        into_emissions(saved)
    }

    async fn delete_for_source(&self, source_id: DbId) -> Result<u64, CoreError> {
        CalculatedEmissionRepo::delete_for_source(&self.pool, source_id)
            .await
            .map_err(map_db_error)
    }

    async fn delete_orphans(&self) -> Result<u64, CoreError> {
        let deleted = CalculatedEmissionRepo::delete_orphans(&self.pool)
            .await
            .map_err(map_db_error)?;
        if deleted > 0 {
            tracing::info!(deleted, "Deleted orphaned calculated emission values");
        }
        Ok(deleted)
    }

    async fn list_for_source(&self, source_id: DbId) -> Result<Vec<CalculatedEmission>, CoreError> {
        let rows = CalculatedEmissionRepo::list_for_source(&self.pool, source_id)
            .await
            .map_err(map_db_error)?;
        into_emissions(rows)
    }
}
