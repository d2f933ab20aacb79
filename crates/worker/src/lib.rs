//! Batch runner for the emission calculation engine.

pub mod config;
pub mod logging;
pub mod runner;
