//! Activity values: aggregated, period-scoped observations of raw activity
//! data that feed the emission calculator.
//!
//! Activity values are produced upstream by submission aggregation; the
//! calculation engine only reads them.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Aggregation level
// ---------------------------------------------------------------------------

pub const LEVEL_MONTHLY: &str = "monthly";
pub const LEVEL_ANNUAL: &str = "annual";

/// All valid aggregation level strings.
pub const VALID_LEVELS: &[&str] = &[LEVEL_MONTHLY, LEVEL_ANNUAL];

/// Period granularity of an activity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationLevel {
    Monthly,
    Annual,
}

impl AggregationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => LEVEL_MONTHLY,
            Self::Annual => LEVEL_ANNUAL,
        }
    }

    /// Parse a level string, case-insensitively.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            LEVEL_MONTHLY => Ok(Self::Monthly),
            LEVEL_ANNUAL => Ok(Self::Annual),
            other => Err(CoreError::Validation(format!(
                "Unknown aggregation level: '{other}'. Valid levels: {}",
                VALID_LEVELS.join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Activity value
// ---------------------------------------------------------------------------

/// One aggregated activity-data observation for a metric, layer and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityValue {
    pub id: DbId,
    pub metric_id: DbId,
    pub layer_id: DbId,
    pub assignment_id: Option<DbId>,
    pub reporting_period: NaiveDate,
    pub level: AggregationLevel,
    pub numeric_value: Option<f64>,
    /// Structured payload for composite metrics (e.g. a JSON vehicle log).
    pub text_value: Option<String>,
}

impl ActivityValue {
    /// Calendar year of the reporting period, used as the factor lookup year.
    pub fn year(&self) -> i32 {
        self.reporting_period.year()
    }

    /// The numeric magnitude, if present and finite.
    pub fn usable_numeric_value(&self) -> Option<f64> {
        self.numeric_value.filter(|v| v.is_finite())
    }

    /// Whether the structured text payload carries anything to parse.
    pub fn has_text_value(&self) -> bool {
        self.text_value
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Batch filters
// ---------------------------------------------------------------------------

/// Period filter for assignment-scoped batch runs.
///
/// `period_date` takes precedence over `year`/`month` when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub period_date: Option<NaiveDate>,
    pub level: Option<AggregationLevel>,
}

impl PeriodFilter {
    /// Validate the month range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(CoreError::Validation(format!(
                    "Month must be between 1 and 12, got {month}"
                )));
            }
        }
        Ok(())
    }

    /// Whether an activity value falls inside this filter.
    pub fn matches(&self, value: &ActivityValue) -> bool {
        if let Some(level) = self.level {
            if value.level != level {
                return false;
            }
        }
        if let Some(date) = self.period_date {
            return value.reporting_period == date;
        }
        if let Some(year) = self.year {
            if value.reporting_period.year() != year {
                return false;
            }
        }
        if let Some(month) = self.month {
            if value.reporting_period.month() != month {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
