//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod activity_value_repo;
pub mod calculated_emission_repo;
pub mod emission_factor_repo;
pub mod metric_repo;

pub use activity_value_repo::ActivityValueRepo;
pub use calculated_emission_repo::CalculatedEmissionRepo;
pub use emission_factor_repo::EmissionFactorRepo;
pub use metric_repo::MetricRepo;
