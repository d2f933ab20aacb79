use anyhow::Context;
use esg_db::PgStore;
use esg_worker::config::WorkerConfig;
use esg_worker::runner::{log_summary, Runner};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    esg_worker::logging::init();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    let pool = esg_db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    esg_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    esg_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!(max_connections = config.max_connections, "Database ready");

    let runner = Runner::new(PgStore::new(pool.clone()), &config);

    match config.interval {
        None => {
            let summary = runner.run_once().await.context("Recalculation failed")?;
            log_summary(&summary);
        }
        Some(period) => {
            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Shutdown signal received"),
                    Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
                }
                shutdown.cancel();
            });
            runner.run_periodic(period, cancel).await;
        }
    }

    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}
