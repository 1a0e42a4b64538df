use async_trait::async_trait;
use tracing::{error, info};

use crate::models::Job;

/// Outbound notifications: user-facing welcomes and the operator channel for jobs
/// that exhausted their retries.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn welcome(&self, email: &str) -> anyhow::Result<()>;

    async fn job_dead(&self, job: &Job, error: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn welcome(&self, email: &str) -> anyhow::Result<()> {
        info!(target: "notifications", %email, "Welcome {email}!");
        Ok(())
    }

    async fn job_dead(&self, job: &Job, error: &str) {
        error!(
            target: "operator",
            job_id = %job.id,
            job_type = %job.job_type,
            attempts = job.attempts,
            %error,
            "job moved to dead state"
        );
    }
}
