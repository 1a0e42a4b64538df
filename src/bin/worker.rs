use std::sync::Arc;

use tokio::signal;

use files_manager::{
    config::AppConfig, default_handlers, init_tracing, state::AppState, Worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let slots = config.worker_concurrency;
    let poll_interval = config.worker_poll_interval;
    tracing::info!(
        component = "worker",
        database_url = %config.redacted_database_url(),
        slots,
        max_attempts = config.job_max_attempts,
        lease_secs = config.job_lease.as_secs(),
        "loaded configuration"
    );

    // One connection per slot, plus one for acknowledgements in flight.
    let pool_size = u32::try_from(slots).unwrap_or(u32::MAX).saturating_add(1);
    let state = Arc::new(AppState::connect(config, pool_size).await?);
    let worker = Arc::new(Worker::new(state, default_handlers(), poll_interval));
    let shutdown = worker.shutdown_token();

    let loops = tokio::spawn(worker.run_concurrently(slots));
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("worker received shutdown signal; finishing in-flight jobs");
    shutdown.cancel();
    loops.await?;

    Ok(())
}
