//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` row struct matching the database columns
//! - A `Deserialize` create DTO, where rows are seeded outside the engine
//! - Conversion into the matching `esg-core` domain type

pub mod activity_value;
pub mod calculated_emission;
pub mod emission_factor;
pub mod metric;
