//! Storage seams of the calculation engine.
//!
//! The engine never talks to a database directly. It reads factors through
//! [`FactorStore`], reads activity values and metrics through
//! [`ActivityStore`], and writes results through [`EmissionStore`]. The
//! `esg-db` crate provides PostgreSQL implementations; [`crate::memory`]
//! and [`crate::factor_table`] provide in-process ones.

use async_trait::async_trait;

use crate::activity::{ActivityValue, PeriodFilter};
use crate::emission::{CalculatedEmission, NewCalculatedEmission};
use crate::error::CoreError;
use crate::factor::{EmissionFactor, FactorCriteria};
use crate::metric::Metric;
use crate::types::DbId;

/// Read-only access to the emission factor table.
#[async_trait]
pub trait FactorStore: Send + Sync {
    /// The first factor matching `criteria` in natural order
    /// (see [`crate::factor::natural_order`]).
    async fn find_first(&self, criteria: &FactorCriteria)
        -> Result<Option<EmissionFactor>, CoreError>;
}

/// Read access to activity values and the metrics they belong to.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn find_metric(&self, metric_id: DbId) -> Result<Option<Metric>, CoreError>;

    /// Eligible activity values of an assignment, ordered by reporting period
    /// then id. A value is eligible when it carries a numeric value, or a
    /// non-blank text value on a metric that reads structured text.
    async fn list_for_assignment(
        &self,
        assignment_id: DbId,
        filter: &PeriodFilter,
    ) -> Result<Vec<ActivityValue>, CoreError>;

    /// Every eligible activity value, ordered by id.
    async fn list_all(&self) -> Result<Vec<ActivityValue>, CoreError>;
}

/// Exclusive writer for calculated emission values.
#[async_trait]
pub trait EmissionStore: Send + Sync {
    /// Atomically delete every record of `source_id` and insert `records`.
    ///
    /// Readers observe either the old or the new complete set. Failure to
    /// open or commit the transaction is reported as
    /// [`CoreError::Transaction`].
    async fn replace_for_source(
        &self,
        source_id: DbId,
        records: Vec<NewCalculatedEmission>,
    ) -> Result<Vec<CalculatedEmission>, CoreError>;

    /// Delete every record of `source_id`. Returns the number removed.
    async fn delete_for_source(&self, source_id: DbId) -> Result<u64, CoreError>;

    /// Delete records whose source activity value no longer exists.
    async fn delete_orphans(&self) -> Result<u64, CoreError>;

    /// Records of `source_id`, primary record first.
    async fn list_for_source(&self, source_id: DbId) -> Result<Vec<CalculatedEmission>, CoreError>;
}
