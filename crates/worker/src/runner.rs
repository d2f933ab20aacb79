//! Batch recalculation runs, one-shot or on a fixed interval.
//!
//! The periodic loop follows the usual background-job shape: a
//! `tokio::time::interval` raced against a [`CancellationToken`]. A failed
//! run is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use esg_core::{BatchSummary, CoreError, EmissionCalculator};
use esg_db::PgStore;
use tokio_util::sync::CancellationToken;

use crate::config::{RecalcMode, WorkerConfig};

/// Owns the calculator and what to run with it.
#[derive(Clone)]
pub struct Runner {
    store: PgStore,
    calculator: EmissionCalculator,
    mode: RecalcMode,
    factor_snapshot: bool,
}

impl Runner {
    pub fn new(store: PgStore, config: &WorkerConfig) -> Self {
        let shared = Arc::new(store.clone());
        let calculator = EmissionCalculator::new(
            shared.clone(),
            shared.clone(),
            shared,
            config.engine.clone(),
        );
        Self {
            store,
            calculator,
            mode: config.mode.clone(),
            factor_snapshot: config.factor_snapshot,
        }
    }

    /// Run one batch.
    pub async fn run_once(&self) -> Result<BatchSummary, CoreError> {
        let calculator = if self.factor_snapshot {
            let table = self.store.load_factor_table().await?;
            self.calculator.with_factor_store(Arc::new(table))
        } else {
            self.calculator.clone()
        };

        match &self.mode {
            RecalcMode::All => calculator.recalculate_all().await,
            RecalcMode::Assignment {
                assignment_id,
                filter,
            } => calculator.calculate_for_assignment(*assignment_id, filter).await,
        }
    }

    /// Run a batch every `period` until `cancel` fires. The first batch
    /// starts immediately.
    pub async fn run_periodic(&self, period: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = period.as_secs(),
            mode = ?self.mode,
            "Periodic recalculation started"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Periodic recalculation stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(summary) => log_summary(&summary),
                        Err(e) => {
                            tracing::error!(error = %e, "Recalculation run failed");
                        }
                    }
                }
            }
        }
    }
}

/// Log a finished batch at a level matching its outcome.
pub fn log_summary(summary: &BatchSummary) {
    if summary.errors > 0 {
        tracing::warn!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            errors = summary.errors,
            "Recalculation finished with errors"
        );
    } else {
        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            primary_records = summary.primary_records,
            component_records = summary.component_records,
            orphans_deleted = summary.orphans_deleted,
            "Recalculation finished"
        );
    }
}
