//! ESG emission calculation engine.
//!
//! Turns activity values (fuel burned, electricity used, vehicle logs) into
//! calculated emission records:
//!
//! - [`resolver::FactorResolver`]: factor lookup with region, unit and year
//!   fallback.
//! - [`strategies`]: per-metric-type calculation strategies and the
//!   [`strategies::StrategyRegistry`].
//! - [`calculator::EmissionCalculator`]: dispatch, primary/component
//!   bookkeeping, persistence and batch drivers.
//! - [`store`]: the storage traits implemented by `esg-db`, with
//!   in-process versions in [`factor_table`] and [`memory`].

pub mod activity;
pub mod calculator;
pub mod config;
pub mod emission;
pub mod error;
pub mod factor;
pub mod factor_table;
pub mod memory;
pub mod metric;
pub mod resolver;
pub mod store;
pub mod strategies;
pub mod types;

pub use calculator::{BatchSummary, EmissionCalculator};
pub use error::CoreError;
