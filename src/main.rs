use std::net::SocketAddr;

use anyhow::Context;
use tokio::{net::TcpListener, signal};

use files_manager::{config::AppConfig, init_tracing, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        redis_url = %config.redacted_redis_url(),
        pool_size = config.database_max_pool_size,
        storage_backend = ?config.storage_backend,
        "loaded configuration"
    );

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST/SERVER_PORT do not form a socket address")?;
    let pool_size = config.database_max_pool_size;
    let state = AppState::connect(config, pool_size).await?;
    let app = routes::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("api received shutdown signal");
        })
        .await?;

    Ok(())
}
