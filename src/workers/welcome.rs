use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{jobs::JOB_WELCOME, models::Job, state::AppState};

use super::{JobExecution, JobHandler};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WelcomeJobPayload {
    user_id: Option<String>,
}

/// Greets a freshly signed-up user through the configured notifier.
pub struct WelcomeEmailJob;

impl WelcomeEmailJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WelcomeEmailJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for WelcomeEmailJob {
    fn job_type(&self) -> &'static str {
        JOB_WELCOME
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: WelcomeJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid welcome payload: {err}"),
                }
            }
        };
        let Some(user_id) = payload.user_id else {
            return JobExecution::Failed {
                error: "Missing userId".into(),
            };
        };
        let Ok(user_id) = Uuid::parse_str(&user_id) else {
            return JobExecution::Failed {
                error: "User not found".into(),
            };
        };

        let user = match state.users.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return JobExecution::Failed {
                    error: "User not found".into(),
                }
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "user lookup failed; will retry");
                return JobExecution::Retry {
                    error: err.to_string(),
                };
            }
        };

        match state.notifier.welcome(&user.email).await {
            Ok(()) => JobExecution::Success,
            Err(err) => JobExecution::Retry {
                error: format!("notification failed: {err}"),
            },
        }
    }
}
