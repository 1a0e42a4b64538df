use std::env;

use anyhow::{Context, Result};

use files_manager::{
    config::AppConfig,
    db,
    jobs::{JobQueue, PgJobQueue},
};

const USAGE: &str = "Usage: maintenance <list-dead|requeue-dead>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut args = env::args().skip(1);
    let command = args.next();
    let queue = match command.as_deref() {
        Some("list-dead") | Some("requeue-dead") => connect_queue()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    match command.as_deref() {
        Some("list-dead") => list_dead(&queue).await?,
        _ => requeue_dead(&queue).await?,
    }
    Ok(())
}

fn connect_queue() -> Result<PgJobQueue> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)
        .context("failed to open database pool")?;
    Ok(PgJobQueue::new(pool))
}

async fn list_dead(queue: &PgJobQueue) -> Result<()> {
    let jobs = queue.dead_jobs().await.context("failed to load dead jobs")?;
    if jobs.is_empty() {
        println!("No dead jobs.");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}\t{}\tattempts={}\t{}\t{}",
            job.id,
            job.job_type,
            job.attempts,
            job.payload,
            job.last_error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn requeue_dead(queue: &PgJobQueue) -> Result<()> {
    let count = queue
        .requeue_dead()
        .await
        .context("failed to requeue dead jobs")?;
    println!("Requeued {count} dead jobs.");
    Ok(())
}
