//! Worker configuration loaded from environment variables.

use std::time::Duration;

use chrono::NaiveDate;
use esg_core::activity::{AggregationLevel, PeriodFilter};
use esg_core::config::{EngineConfig, RegionGroups, DEFAULT_REGION_GROUPS};
use esg_core::types::DbId;
use esg_db::DEFAULT_MAX_CONNECTIONS;

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// What a run recalculates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecalcMode {
    /// Every eligible activity value, then the orphan sweep.
    All,
    /// One assignment, optionally narrowed by period.
    Assignment {
        assignment_id: DbId,
        filter: PeriodFilter,
    },
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub mode: RecalcMode,
    /// `None` runs once and exits.
    pub interval: Option<Duration>,
    /// Load the factor table into memory before each run.
    pub factor_snapshot: bool,
    pub engine: EngineConfig,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default        |
    /// |------------------------|----------------|
    /// | `DATABASE_URL`         | required       |
    /// | `DB_MAX_CONNECTIONS`   | `20`           |
    /// | `RECALC_MODE`          | `all`          |
    /// | `RECALC_ASSIGNMENT_ID` | required for `assignment` |
    /// | `RECALC_YEAR`          | unset          |
    /// | `RECALC_MONTH`         | unset          |
    /// | `RECALC_PERIOD_DATE`   | unset          |
    /// | `RECALC_LEVEL`         | unset          |
    /// | `RECALC_INTERVAL_SECS` | unset (run once) |
    /// | `REGION_GROUPS`        | `HK+MO=HK_MO`  |
    /// | `FACTOR_SNAPSHOT`      | `false`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => parse_number("DB_MAX_CONNECTIONS", &v)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let mode = match get("RECALC_MODE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("all") => RecalcMode::All,
            Some("assignment") => {
                let assignment_id = get("RECALC_ASSIGNMENT_ID")
                    .ok_or(ConfigError::Missing("RECALC_ASSIGNMENT_ID"))?;
                RecalcMode::Assignment {
                    assignment_id: parse_number("RECALC_ASSIGNMENT_ID", &assignment_id)?,
                    filter: period_filter(&get)?,
                }
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "RECALC_MODE",
                    reason: format!("expected 'all' or 'assignment', got '{other}'"),
                })
            }
        };

        let interval = match get("RECALC_INTERVAL_SECS") {
            Some(v) => {
                let secs: u64 = parse_number("RECALC_INTERVAL_SECS", &v)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "RECALC_INTERVAL_SECS",
                        reason: "must be greater than zero".into(),
                    });
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let region_groups = RegionGroups::parse(
            get("REGION_GROUPS").as_deref().unwrap_or(DEFAULT_REGION_GROUPS),
        )
        .map_err(|e| ConfigError::Invalid {
            key: "REGION_GROUPS",
            reason: e.to_string(),
        })?;

        let factor_snapshot = match get("FACTOR_SNAPSHOT") {
            Some(v) => parse_bool("FACTOR_SNAPSHOT", &v)?,
            None => false,
        };

        Ok(Self {
            database_url,
            max_connections,
            mode,
            interval,
            factor_snapshot,
            engine: EngineConfig {
                region_groups,
                ..EngineConfig::default()
            },
        })
    }
}

fn period_filter<G>(get: &G) -> Result<PeriodFilter, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let year = get("RECALC_YEAR")
        .map(|v| parse_number("RECALC_YEAR", &v))
        .transpose()?;
    let month = get("RECALC_MONTH")
        .map(|v| parse_number("RECALC_MONTH", &v))
        .transpose()?;
    let period_date = get("RECALC_PERIOD_DATE")
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|e| ConfigError::Invalid {
                key: "RECALC_PERIOD_DATE",
                reason: e.to_string(),
            })
        })
        .transpose()?;
    let level = get("RECALC_LEVEL")
        .map(|v| {
            AggregationLevel::parse(&v).map_err(|e| ConfigError::Invalid {
                key: "RECALC_LEVEL",
                reason: e.to_string(),
            })
        })
        .transpose()?;

    let filter = PeriodFilter {
        year,
        month,
        period_date,
        level,
    };
    filter.validate().map_err(|e| ConfigError::Invalid {
        key: "RECALC_MONTH",
        reason: e.to_string(),
    })?;
    Ok(filter)
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/esg")]).unwrap();
        assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(cfg.mode, RecalcMode::All);
        assert_eq!(cfg.interval, None);
        assert!(!cfg.factor_snapshot);
        assert_eq!(cfg.engine.region_groups.combined_region_for("MO"), Some("HK_MO"));
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
        assert_matches!(
            load(&[("DATABASE_URL", "  ")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn assignment_mode_reads_period_filter() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/esg"),
            ("RECALC_MODE", "Assignment"),
            ("RECALC_ASSIGNMENT_ID", "42"),
            ("RECALC_YEAR", "2023"),
            ("RECALC_MONTH", "6"),
            ("RECALC_LEVEL", "monthly"),
            ("RECALC_INTERVAL_SECS", "300"),
            ("FACTOR_SNAPSHOT", "true"),
        ])
        .unwrap();

        assert_matches!(
            cfg.mode,
            RecalcMode::Assignment { assignment_id: 42, ref filter }
                if filter.year == Some(2023)
                    && filter.month == Some(6)
                    && filter.level == Some(AggregationLevel::Monthly)
        );
        assert_eq!(cfg.interval, Some(Duration::from_secs(300)));
        assert!(cfg.factor_snapshot);
    }

    #[test]
    fn assignment_mode_requires_assignment_id() {
        assert_matches!(
            load(&[("DATABASE_URL", "x"), ("RECALC_MODE", "assignment")]),
            Err(ConfigError::Missing("RECALC_ASSIGNMENT_ID"))
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            ("RECALC_MODE", "sometimes"),
            ("DB_MAX_CONNECTIONS", "many"),
            ("RECALC_INTERVAL_SECS", "0"),
            ("REGION_GROUPS", "HK+MO"),
            ("FACTOR_SNAPSHOT", "maybe"),
        ] {
            let result = load(&[("DATABASE_URL", "x"), (key, value)]);
            assert_matches!(result, Err(ConfigError::Invalid { key: k, .. }) if k == key);
        }
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "x"),
            ("RECALC_MODE", "assignment"),
            ("RECALC_ASSIGNMENT_ID", "1"),
            ("RECALC_MONTH", "13"),
        ]);
        assert_matches!(result, Err(ConfigError::Invalid { key: "RECALC_MONTH", .. }));
    }
}
