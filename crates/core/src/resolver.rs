//! Factor resolution with a deterministic fallback chain.
//!
//! Lookup order, first match wins:
//!
//! 1. exact year, requested region
//! 2. exact year, combined region of the requested region's group
//! 3. exact year, universal region
//! 4. steps 1-3 again without the activity unit
//! 5. closest earlier year, requested region
//! 6. closest earlier year, universal region
//! 7. steps 5-6 again without the activity unit
//!
//! A miss at every step yields `None`; callers skip the calculation.

use std::sync::Arc;

use crate::config::RegionGroups;
use crate::error::CoreError;
use crate::factor::{is_universal_region, EmissionFactor, FactorCriteria, RegionMatch, YearMatch};
use crate::store::FactorStore;
use crate::types::Scope;

/// What a caller wants a factor for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorLookup {
    pub year: i32,
    pub category: String,
    pub sub_category: String,
    pub activity_unit: Option<String>,
    pub region: Option<String>,
    pub scope: Option<Scope>,
}

/// Resolves [`FactorLookup`]s against an injected [`FactorStore`].
#[derive(Clone)]
pub struct FactorResolver {
    store: Arc<dyn FactorStore>,
    region_groups: RegionGroups,
}

impl FactorResolver {
    pub fn new(store: Arc<dyn FactorStore>, region_groups: RegionGroups) -> Self {
        Self {
            store,
            region_groups,
        }
    }

    /// Find the most specific factor for `lookup`, or `None`.
    pub async fn find_matching_factor(
        &self,
        lookup: &FactorLookup,
    ) -> Result<Option<EmissionFactor>, CoreError> {
        let unit = lookup.activity_unit.as_deref();

        if let Some(f) = self.same_year(lookup, unit).await? {
            return Ok(Some(f));
        }
        if unit.is_some() {
            if let Some(f) = self.same_year(lookup, None).await? {
                return Ok(Some(f));
            }
        }
        if let Some(f) = self.earlier_year(lookup, unit).await? {
            return Ok(Some(f));
        }
        if unit.is_some() {
            if let Some(f) = self.earlier_year(lookup, None).await? {
                return Ok(Some(f));
            }
        }

        tracing::debug!(
            year = lookup.year,
            category = %lookup.category,
            sub_category = %lookup.sub_category,
            activity_unit = ?lookup.activity_unit,
            region = ?lookup.region,
            scope = ?lookup.scope,
            "No emission factor at any fallback level"
        );
        Ok(None)
    }

    async fn same_year(
        &self,
        lookup: &FactorLookup,
        unit: Option<&str>,
    ) -> Result<Option<EmissionFactor>, CoreError> {
        let mut regions = Vec::with_capacity(3);
        if let Some(region) = self.named_region(lookup) {
            regions.push(RegionMatch::Named(region.to_string()));
            if let Some(combined) = self.region_groups.combined_region_for(region) {
                regions.push(RegionMatch::Named(combined.to_string()));
            }
        }
        regions.push(RegionMatch::Universal);

        self.first_of(lookup, YearMatch::Exact(lookup.year), unit, regions)
            .await
    }

    async fn earlier_year(
        &self,
        lookup: &FactorLookup,
        unit: Option<&str>,
    ) -> Result<Option<EmissionFactor>, CoreError> {
        let mut regions = Vec::with_capacity(2);
        if let Some(region) = self.named_region(lookup) {
            regions.push(RegionMatch::Named(region.to_string()));
        }
        regions.push(RegionMatch::Universal);

        self.first_of(lookup, YearMatch::Before(lookup.year), unit, regions)
            .await
    }

    async fn first_of(
        &self,
        lookup: &FactorLookup,
        year: YearMatch,
        unit: Option<&str>,
        regions: Vec<RegionMatch>,
    ) -> Result<Option<EmissionFactor>, CoreError> {
        for region in regions {
            let criteria = FactorCriteria {
                year,
                category: lookup.category.clone(),
                sub_category: lookup.sub_category.clone(),
                activity_unit: unit.map(String::from),
                region,
                scope: lookup.scope,
            };
            if let Some(factor) = self.store.find_first(&criteria).await? {
                tracing::trace!(factor_id = factor.id, ?criteria, "Emission factor matched");
                return Ok(Some(factor));
            }
        }
        Ok(None)
    }

    /// The requested region, unless it is itself a universal sentinel.
    fn named_region<'a>(&self, lookup: &'a FactorLookup) -> Option<&'a str> {
        lookup
            .region
            .as_deref()
            .filter(|r| !is_universal_region(Some(r)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
