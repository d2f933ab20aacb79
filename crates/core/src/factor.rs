//! Emission factor types, lookup criteria and the shared ordering rules
//! every factor store applies.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Scope};

// ---------------------------------------------------------------------------
// Region constants
// ---------------------------------------------------------------------------

/// Explicit sentinel for a factor that applies in every region.
pub const REGION_ALL: &str = "ALL";

/// Whether a stored region value means "applies everywhere".
///
/// `NULL`, the empty string and [`REGION_ALL`] are all treated as universal.
pub fn is_universal_region(region: Option<&str>) -> bool {
    match region {
        None => true,
        Some(r) => {
            let r = r.trim();
            r.is_empty() || r.eq_ignore_ascii_case(REGION_ALL)
        }
    }
}

// ---------------------------------------------------------------------------
// Scope limits
// ---------------------------------------------------------------------------

pub const MIN_SCOPE: Scope = 1;
pub const MAX_SCOPE: Scope = 3;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A rate converting one unit of activity into emissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    pub id: DbId,
    pub year: i32,
    pub category: String,
    pub sub_category: String,
    pub activity_unit: String,
    pub value: f64,
    /// e.g. `kgCO2e/L`; the part before `/` is the emission unit.
    pub factor_unit: String,
    pub region: Option<String>,
    pub scope: Option<Scope>,
    pub source: Option<String>,
}

impl EmissionFactor {
    pub fn emission_unit(&self) -> String {
        emission_unit_from_factor_unit(&self.factor_unit)
    }

    pub fn is_universal(&self) -> bool {
        is_universal_region(self.region.as_deref())
    }

    /// Whether this factor satisfies every constraint in `criteria`.
    pub fn matches(&self, criteria: &FactorCriteria) -> bool {
        if self.category != criteria.category || self.sub_category != criteria.sub_category {
            return false;
        }
        let year_ok = match criteria.year {
            YearMatch::Exact(y) => self.year == y,
            YearMatch::Before(y) => self.year < y,
        };
        if !year_ok {
            return false;
        }
        if let Some(unit) = &criteria.activity_unit {
            if &self.activity_unit != unit {
                return false;
            }
        }
        if let Some(scope) = criteria.scope {
            if self.scope != Some(scope) {
                return false;
            }
        }
        match &criteria.region {
            RegionMatch::Named(region) => self.region.as_deref() == Some(region.as_str()),
            RegionMatch::Universal => self.is_universal(),
        }
    }
}

/// Derive the emission unit from a factor unit such as `kgCO2e/kWh`.
///
/// Returns the trimmed substring before the first `/`, or the whole unit
/// when it has no denominator.
pub fn emission_unit_from_factor_unit(factor_unit: &str) -> String {
    factor_unit
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Lookup criteria
// ---------------------------------------------------------------------------

/// Year constraint of a single lookup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearMatch {
    Exact(i32),
    /// Strictly earlier years; the most recent one wins.
    Before(i32),
}

/// Region constraint of a single lookup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionMatch {
    Named(String),
    Universal,
}

/// One concrete query against a factor store.
///
/// `activity_unit` and `scope` set to `None` mean "any".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorCriteria {
    pub year: YearMatch,
    pub category: String,
    pub sub_category: String,
    pub activity_unit: Option<String>,
    pub region: RegionMatch,
    pub scope: Option<Scope>,
}

/// Natural ordering of factor candidates inside one lookup step: most
/// recent year first, named regions before universal ones, then unit,
/// factor unit, scope (unscoped last) and id.
pub fn natural_order(a: &EmissionFactor, b: &EmissionFactor) -> Ordering {
    b.year
        .cmp(&a.year)
        .then_with(|| a.is_universal().cmp(&b.is_universal()))
        .then_with(|| cmp_nulls_last(&a.region, &b.region))
        .then_with(|| a.activity_unit.cmp(&b.activity_unit))
        .then_with(|| a.factor_unit.cmp(&b.factor_unit))
        .then_with(|| cmp_nulls_last(&a.scope, &b.scope))
        .then_with(|| a.id.cmp(&b.id))
}

fn cmp_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a scope value (1, 2 or 3).
pub fn validate_scope(scope: Scope) -> Result<(), CoreError> {
    if (MIN_SCOPE..=MAX_SCOPE).contains(&scope) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Scope must be between {MIN_SCOPE} and {MAX_SCOPE}, got {scope}"
        )))
    }
}

/// Validate the fields of a factor before it is stored.
pub fn validate_factor(
    category: &str,
    sub_category: &str,
    activity_unit: &str,
    factor_unit: &str,
    value: f64,
    scope: Option<Scope>,
) -> Result<(), CoreError> {
    for (name, field) in [
        ("category", category),
        ("sub_category", sub_category),
        ("activity_unit", activity_unit),
        ("factor_unit", factor_unit),
    ] {
        if field.trim().is_empty() {
            return Err(CoreError::Validation(format!("{name} must not be empty")));
        }
    }
    if !value.is_finite() {
        return Err(CoreError::Validation(format!(
            "Factor value must be finite, got {value}"
        )));
    }
    if let Some(scope) = scope {
        validate_scope(scope)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
