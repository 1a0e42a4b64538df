use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    jobs::{JobQueue, JobQueueError},
    models::Job,
    state::AppState,
};

pub mod thumbnails;
pub mod welcome;

const BASE_RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, PartialEq, Eq)]
pub enum JobExecution {
    Success,
    /// Transient fault; the job runs again after a backoff unless its budget is spent.
    Retry { error: String },
    /// Permanent fault; retrying cannot help.
    Failed { error: String },
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;
    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution;
}

/// Exponential backoff for the `attempts`-th failed run, capped at five minutes.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    BASE_RETRY_DELAY
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(MAX_RETRY_DELAY)
}

pub struct Worker {
    state: Arc<AppState>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    poll_interval: Duration,
    max_attempts: i32,
    lease: Duration,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        state: Arc<AppState>,
        handlers: Vec<Arc<dyn JobHandler>>,
        poll_interval: Duration,
    ) -> Self {
        let map = handlers
            .into_iter()
            .map(|handler| (handler.job_type(), handler))
            .collect();
        let max_attempts = state.config.job_max_attempts.max(1);
        let lease = state.config.job_lease;
        Self {
            state,
            handlers: map,
            poll_interval,
            max_attempts,
            lease,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling the token stops every loop once its current job is settled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn queue(&self) -> &dyn JobQueue {
        self.state.jobs.as_ref()
    }

    pub async fn run(&self) {
        info!(job_types = ?self.handlers.keys().collect::<Vec<_>>(), "worker started");
        while !self.shutdown.is_cancelled() {
            let idle = match self.tick().await {
                Ok(found) => !found,
                Err(err) => {
                    error!(error = %err, "worker tick failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    _ = self.shutdown.cancelled() => {}
                }
            }
        }
        info!("worker loop stopped");
    }

    /// Runs `slots` polling loops side by side. Reservation skips locked rows, so
    /// slots never pick up the same job.
    pub async fn run_concurrently(self: Arc<Self>, slots: usize) {
        let mut loops = JoinSet::new();
        for _ in 0..slots.max(1) {
            let worker = self.clone();
            loops.spawn(async move { worker.run().await });
        }
        while let Some(result) = loops.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "worker loop exited unexpectedly");
            }
        }
    }

    /// Processes at most one job. Returns whether a job was found.
    pub async fn tick(&self) -> Result<bool, JobQueueError> {
        let job_types: Vec<&'static str> = self.handlers.keys().copied().collect();
        if job_types.is_empty() {
            return Ok(false);
        }

        let Some(job) = self.queue().reserve(&job_types, self.lease).await? else {
            return Ok(false);
        };

        // Only a lease taken over from a worker that died during its last allowed run
        // gets past the budget.
        if job.attempts > self.max_attempts {
            warn!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, "job lease expired after final attempt");
            self.bury(&job, "lease expired after final attempt").await?;
            return Ok(true);
        }

        let Some(handler) = self.handlers.get(job.job_type.as_str()) else {
            error!(job_type = %job.job_type, "no handler registered for job type");
            self.bury(&job, "no handler registered").await?;
            return Ok(true);
        };

        match handler.handle(self.state.clone(), job.clone()).await {
            JobExecution::Success => {
                self.queue().acknowledge(job.id).await?;
                info!(job_id = %job.id, job_type = %job.job_type, "job completed successfully");
            }
            JobExecution::Retry { error } if job.attempts >= self.max_attempts => {
                warn!(job_id = %job.id, job_type = %job.job_type, %error, "job exhausted retries");
                self.bury(&job, &error).await?;
            }
            JobExecution::Retry { error } => {
                let delay = retry_delay(job.attempts);
                warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempts = job.attempts,
                    delay_secs = delay.as_secs(),
                    %error,
                    "job will retry"
                );
                self.queue().retry_after(job.id, delay, &error).await?;
            }
            JobExecution::Failed { error } => {
                error!(job_id = %job.id, job_type = %job.job_type, %error, "job failed");
                self.bury(&job, &error).await?;
            }
        }
        Ok(true)
    }

    async fn bury(&self, job: &Job, error: &str) -> Result<(), JobQueueError> {
        self.queue().bury(job.id, error).await?;
        self.state.notifier.job_dead(job, error).await;
        Ok(())
    }
}

pub fn default_handlers() -> Vec<Arc<dyn JobHandler>> {
    vec![
        Arc::new(thumbnails::GenerateThumbnailsJob::new()),
        Arc::new(welcome::WelcomeEmailJob::new()),
    ]
}
