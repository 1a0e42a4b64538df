use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{Job, NewJob};
use crate::repository::{with_conn, StoreError};
use crate::schema::jobs;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_DEAD: &str = "dead";

pub const JOB_THUMBNAIL: &str = "thumbnail";
pub const JOB_WELCOME: &str = "welcome";

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<diesel::result::Error> for JobQueueError {
    fn from(value: diesel::result::Error) -> Self {
        JobQueueError::Store(StoreError::Database(value))
    }
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailPayload {
    pub user_id: Uuid,
    pub file_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub user_id: Uuid,
}

/// Durable at-least-once work queue.
///
/// Jobs move `queued → processing`, then are either acknowledged (removed),
/// requeued with a delay, or buried in the `dead` state for an operator to inspect.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Persists a job and returns once it is accepted, not once it has run.
    async fn enqueue(&self, job_type: &str, payload: Value) -> JobQueueResult<Uuid>;

    /// Claims the oldest runnable job of one of `job_types`, bumping its attempt count.
    ///
    /// The claim holds for `lease`. A job still `processing` once its lease ran out
    /// belongs to a worker that stopped mid-run and is claimed again.
    async fn reserve(
        &self,
        job_types: &[&'static str],
        lease: Duration,
    ) -> JobQueueResult<Option<Job>>;

    async fn acknowledge(&self, job_id: Uuid) -> JobQueueResult<()>;

    async fn retry_after(&self, job_id: Uuid, delay: Duration, error: &str)
        -> JobQueueResult<()>;

    async fn bury(&self, job_id: Uuid, error: &str) -> JobQueueResult<()>;

    async fn dead_jobs(&self) -> JobQueueResult<Vec<Job>>;

    /// Moves every dead job back to the queue with a fresh attempt budget.
    async fn requeue_dead(&self) -> JobQueueResult<usize>;
}

pub async fn enqueue_thumbnail(
    queue: &dyn JobQueue,
    payload: &ThumbnailPayload,
) -> JobQueueResult<Uuid> {
    queue
        .enqueue(JOB_THUMBNAIL, serde_json::to_value(payload)?)
        .await
}

pub async fn enqueue_welcome(
    queue: &dyn JobQueue,
    payload: &WelcomePayload,
) -> JobQueueResult<Uuid> {
    queue.enqueue(JOB_WELCOME, serde_json::to_value(payload)?).await
}

#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job_type: &str, payload: Value) -> JobQueueResult<Uuid> {
        let new_job = NewJob {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            payload,
            status: STATUS_QUEUED.to_string(),
            run_after: Utc::now().naive_utc(),
        };

        let id = with_conn(&self.pool, move |conn| {
            diesel::insert_into(jobs::table)
                .values(&new_job)
                .execute(conn)?;
            Ok(new_job.id)
        })
        .await?;
        Ok(id)
    }

    async fn reserve(
        &self,
        job_types: &[&'static str],
        lease: Duration,
    ) -> JobQueueResult<Option<Job>> {
        let job_types: Vec<String> = job_types.iter().map(|ty| ty.to_string()).collect();
        let job = with_conn(&self.pool, move |conn| {
            let now = Utc::now().naive_utc();
            let lease_end =
                now + ChronoDuration::from_std(lease).unwrap_or_else(|_| ChronoDuration::minutes(10));
            conn.transaction(|conn| {
                let job_opt = jobs::table
                    .filter(jobs::status.eq_any([STATUS_QUEUED, STATUS_PROCESSING]))
                    .filter(jobs::run_after.le(now))
                    .filter(jobs::job_type.eq_any(job_types))
                    .order(jobs::run_after.asc())
                    .select(Job::as_select())
                    .for_update()
                    .skip_locked()
                    .first::<Job>(conn)
                    .optional()?;

                let Some(job) = job_opt else {
                    return Ok(None);
                };

                let claimed = diesel::update(jobs::table.find(job.id))
                    .set((
                        jobs::status.eq(STATUS_PROCESSING),
                        jobs::attempts.eq(job.attempts + 1),
                        jobs::run_after.eq(lease_end),
                        jobs::updated_at.eq(now),
                    ))
                    .returning(Job::as_returning())
                    .get_result(conn)?;
                Ok::<Option<Job>, diesel::result::Error>(Some(claimed))
            })
            .map_err(StoreError::from)
        })
        .await?;
        Ok(job)
    }

    async fn acknowledge(&self, job_id: Uuid) -> JobQueueResult<()> {
        with_conn(&self.pool, move |conn| {
            diesel::delete(jobs::table.find(job_id)).execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn retry_after(
        &self,
        job_id: Uuid,
        delay: Duration,
        error: &str,
    ) -> JobQueueResult<()> {
        let error = error.to_string();
        with_conn(&self.pool, move |conn| {
            let now = Utc::now();
            let next_run = now
                + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30));
            diesel::update(jobs::table.find(job_id))
                .set((
                    jobs::status.eq(STATUS_QUEUED),
                    jobs::run_after.eq(next_run.naive_utc()),
                    jobs::last_error.eq(Some(error)),
                    jobs::updated_at.eq(now.naive_utc()),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn bury(&self, job_id: Uuid, error: &str) -> JobQueueResult<()> {
        let error = error.to_string();
        with_conn(&self.pool, move |conn| {
            diesel::update(jobs::table.find(job_id))
                .set((
                    jobs::status.eq(STATUS_DEAD),
                    jobs::last_error.eq(Some(error)),
                    jobs::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn dead_jobs(&self) -> JobQueueResult<Vec<Job>> {
        let dead = with_conn(&self.pool, |conn| {
            Ok(jobs::table
                .filter(jobs::status.eq(STATUS_DEAD))
                .order(jobs::updated_at.asc())
                .select(Job::as_select())
                .load(conn)?)
        })
        .await?;
        Ok(dead)
    }

    async fn requeue_dead(&self) -> JobQueueResult<usize> {
        let count = with_conn(&self.pool, |conn| {
            let now = Utc::now().naive_utc();
            Ok(diesel::update(jobs::table.filter(jobs::status.eq(STATUS_DEAD)))
                .set((
                    jobs::status.eq(STATUS_QUEUED),
                    jobs::attempts.eq(0),
                    jobs::run_after.eq(now),
                    jobs::updated_at.eq(now),
                ))
                .execute(conn)?)
        })
        .await?;
        Ok(count)
    }
}
