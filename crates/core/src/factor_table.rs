//! In-memory factor table.
//!
//! Holds a snapshot of the factor table so batch runs can resolve factors
//! without one query per lookup step. Also serves as the test double for
//! resolver and strategy tests.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::factor::{natural_order, EmissionFactor, FactorCriteria};
use crate::store::FactorStore;

/// A sorted, immutable set of emission factors.
#[derive(Debug, Clone, Default)]
pub struct FactorTable {
    factors: Vec<EmissionFactor>,
}

impl FactorTable {
    /// Build a table; factors are kept in natural order so the first match
    /// of a linear scan is the winner.
    pub fn new(mut factors: Vec<EmissionFactor>) -> Self {
        factors.sort_by(natural_order);
        Self { factors }
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn first_match(&self, criteria: &FactorCriteria) -> Option<&EmissionFactor> {
        self.factors.iter().find(|f| f.matches(criteria))
    }
}

impl From<Vec<EmissionFactor>> for FactorTable {
    fn from(factors: Vec<EmissionFactor>) -> Self {
        Self::new(factors)
    }
}

#[async_trait]
impl FactorStore for FactorTable {
    async fn find_first(
        &self,
        criteria: &FactorCriteria,
    ) -> Result<Option<EmissionFactor>, CoreError> {
        Ok(self.first_match(criteria).cloned())
    }
}
