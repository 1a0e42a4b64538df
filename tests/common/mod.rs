#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use files_manager::cache::{CacheError, CacheResult, SessionCache};
use files_manager::config::{AppConfig, StorageBackend};
use files_manager::jobs::{JobQueue, JobQueueResult, STATUS_DEAD, STATUS_PROCESSING, STATUS_QUEUED};
use files_manager::models::{File, Job, NewFile, ParentRef, User};
use files_manager::notify::Notifier;
use files_manager::repository::{FileRepository, StoreResult, UserRepository};
use files_manager::routes;
use files_manager::state::{AppState, Collaborators};
use files_manager::storage::ObjectStorage;
use files_manager::{default_handlers, Worker};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Cache with a hand-driven clock. An entry is visible while `now < expires_at`.
/// While marked down, every command fails the way a lost Redis connection does.
#[derive(Default)]
pub struct FakeCache {
    now: Mutex<Duration>,
    entries: Mutex<HashMap<String, (String, Duration)>>,
    down: AtomicBool,
}

impl FakeCache {
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn ensure_up(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        let now = *self.now.lock().unwrap();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|(_, expires_at)| now < *expires_at)
            .count()
    }
}

#[async_trait]
impl SessionCache for FakeCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.ensure_up()?;
        let expires_at = *self.now.lock().unwrap() + ttl;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_up()?;
        let now = *self.now.lock().unwrap();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(value, _)| value.clone()))
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        self.ensure_up()?;
        let now = *self.now.lock().unwrap();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .remove(key)
            .is_some_and(|(_, expires_at)| now < expires_at))
    }

    async fn is_healthy(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
}

impl FakeStorage {
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Makes every subsequent call fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    fn allocate_key(&self) -> String {
        format!("/fake/{}", Uuid::new_v4())
    }
}

#[derive(Default)]
pub struct FakeUsers {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn create(&self, email: &str, password_hash: &str) -> StoreResult<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|user| user.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now().naive_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.users.lock().unwrap().len() as i64)
    }
}

/// Keeps files in insertion order, which doubles as creation order.
#[derive(Default)]
pub struct FakeFiles {
    files: Mutex<Vec<File>>,
}

#[async_trait]
impl FileRepository for FakeFiles {
    async fn insert(&self, file: NewFile) -> StoreResult<File> {
        let file = File {
            id: Uuid::new_v4(),
            user_id: file.user_id,
            name: file.name,
            file_type: file.file_type,
            is_public: file.is_public,
            parent: file.parent,
            local_path: file.local_path,
        };
        self.files.lock().unwrap().push(file.clone());
        Ok(file)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<File>> {
        let files = self.files.lock().unwrap();
        Ok(files.iter().find(|file| file.id == id).cloned())
    }

    async fn find_children(
        &self,
        owner: Uuid,
        parent: ParentRef,
        page: i64,
        page_size: i64,
    ) -> StoreResult<Vec<File>> {
        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .filter(|file| file.user_id == owner && file.parent == parent)
            .skip((page.max(0) * page_size) as usize)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn set_public(&self, id: Uuid, is_public: bool) -> StoreResult<Option<File>> {
        let mut files = self.files.lock().unwrap();
        Ok(files.iter_mut().find(|file| file.id == id).map(|file| {
            file.is_public = is_public;
            file.clone()
        }))
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.files.lock().unwrap().len() as i64)
    }
}

/// In-memory queue. Retry delays are recorded on the job but not waited out, so
/// tests can drive retries back to back. Leases on `processing` jobs are honoured
/// against the wall clock.
#[derive(Default)]
pub struct FakeQueue {
    jobs: Mutex<Vec<Job>>,
}

impl FakeQueue {
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn jobs_of_type(&self, job_type: &str) -> Vec<Job> {
        self.jobs()
            .into_iter()
            .filter(|job| job.job_type == job_type)
            .collect()
    }

    fn update(&self, job_id: Uuid, f: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) {
            f(job);
            job.updated_at = Utc::now().naive_utc();
        }
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn enqueue(&self, job_type: &str, payload: Value) -> JobQueueResult<Uuid> {
        let now = Utc::now().naive_utc();
        let job = Job {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            payload,
            status: STATUS_QUEUED.to_string(),
            attempts: 0,
            run_after: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        let id = job.id;
        self.jobs.lock().unwrap().push(job);
        Ok(id)
    }

    async fn reserve(
        &self,
        job_types: &[&'static str],
        lease: Duration,
    ) -> JobQueueResult<Option<Job>> {
        let now = Utc::now().naive_utc();
        let mut jobs = self.jobs.lock().unwrap();
        let claimed = jobs.iter_mut().find(|job| {
            let runnable = job.status == STATUS_QUEUED
                || (job.status == STATUS_PROCESSING && job.run_after <= now);
            runnable && job_types.contains(&job.job_type.as_str())
        });
        Ok(claimed.map(|job| {
            job.status = STATUS_PROCESSING.to_string();
            job.attempts += 1;
            job.run_after = now
                + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero());
            job.clone()
        }))
    }

    async fn acknowledge(&self, job_id: Uuid) -> JobQueueResult<()> {
        self.jobs.lock().unwrap().retain(|job| job.id != job_id);
        Ok(())
    }

    async fn retry_after(
        &self,
        job_id: Uuid,
        delay: Duration,
        error: &str,
    ) -> JobQueueResult<()> {
        let run_after = Utc::now().naive_utc()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.update(job_id, |job| {
            job.status = STATUS_QUEUED.to_string();
            job.run_after = run_after;
            job.last_error = Some(error.to_string());
        });
        Ok(())
    }

    async fn bury(&self, job_id: Uuid, error: &str) -> JobQueueResult<()> {
        self.update(job_id, |job| {
            job.status = STATUS_DEAD.to_string();
            job.last_error = Some(error.to_string());
        });
        Ok(())
    }

    async fn dead_jobs(&self) -> JobQueueResult<Vec<Job>> {
        Ok(self
            .jobs()
            .into_iter()
            .filter(|job| job.status == STATUS_DEAD)
            .collect())
    }

    async fn requeue_dead(&self) -> JobQueueResult<usize> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut count = 0;
        for job in jobs.iter_mut().filter(|job| job.status == STATUS_DEAD) {
            job.status = STATUS_QUEUED.to_string();
            job.attempts = 0;
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    welcomed: Mutex<Vec<String>>,
    dead: Mutex<Vec<(Uuid, String)>>,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl RecordingNotifier {
    pub fn welcomed(&self) -> Vec<String> {
        self.welcomed.lock().unwrap().clone()
    }

    pub fn dead(&self) -> Vec<(Uuid, String)> {
        self.dead.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes `welcome` never return, like a relay that accepts the connection and stalls.
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn welcome(&self, email: &str) -> Result<()> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mail relay unavailable"));
        }
        self.welcomed.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn job_dead(&self, job: &Job, error: &str) {
        self.dead.lock().unwrap().push((job.id, error.to_string()));
    }
}

pub const TEST_JOB_LEASE: Duration = Duration::from_millis(200);

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        database_max_pool_size: 1,
        redis_url: "redis://unused".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        folder_path: "/tmp/files_manager_test".to_string(),
        storage_backend: StorageBackend::Disk,
        session_ttl_seconds: 86_400,
        job_max_attempts: 3,
        job_lease: TEST_JOB_LEASE,
        worker_poll_interval: Duration::from_millis(10),
        worker_concurrency: 1,
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        s3_bucket: None,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub cache: Arc<FakeCache>,
    pub storage: Arc<FakeStorage>,
    pub queue: Arc<FakeQueue>,
    pub notifier: Arc<RecordingNotifier>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let cache = Arc::new(FakeCache::default());
        let storage = Arc::new(FakeStorage::default());
        let queue = Arc::new(FakeQueue::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let parts = Collaborators {
            cache: cache.clone(),
            users: Arc::new(FakeUsers::default()),
            files: Arc::new(FakeFiles::default()),
            jobs: queue.clone(),
            storage: storage.clone(),
            notifier: notifier.clone(),
        };
        let state = AppState::new(test_config(), parts);
        let router = routes::create_router(state.clone());
        Self {
            state,
            cache,
            storage,
            queue,
            notifier,
            router,
        }
    }

    pub fn worker(&self) -> Worker {
        Worker::new(
            Arc::new(self.state.clone()),
            default_handlers(),
            self.state.config.worker_poll_interval,
        )
    }

    /// Runs the worker until no runnable job is left.
    pub async fn drain_jobs(&self) -> Result<usize> {
        let worker = self.worker();
        let mut processed = 0;
        while worker.tick().await? {
            processed += 1;
            if processed > 100 {
                bail!("job queue did not drain");
            }
        }
        Ok(processed)
    }

    pub async fn send(&self, request: Request<Body>) -> hyper::Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response")
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("x-token", token);
        }
        let request = builder.body(Body::from(serde_json::to_vec(payload)?))?;
        Ok(self.send(request).await)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.without_body(Method::GET, path, token).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.without_body(Method::PUT, path, token).await
    }

    pub async fn get_with_authorization(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("authorization", authorization)
            .body(Body::empty())?;
        Ok(self.send(request).await)
    }

    async fn without_body(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("x-token", token);
        }
        Ok(self.send(builder.body(Body::empty())?).await)
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<Uuid> {
        let response = self
            .post_json(
                "/users",
                &serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await?;
        let (status, body) = json_body::<Value>(response).await?;
        if status != StatusCode::CREATED {
            bail!("signup failed with {status}: {body}");
        }
        let id = body["id"]
            .as_str()
            .ok_or_else(|| anyhow!("signup response without id: {body}"))?;
        Ok(Uuid::parse_str(id)?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .get_with_authorization("/connect", &basic_auth(email, password))
            .await?;
        let (status, body) = json_body::<Value>(response).await?;
        if status != StatusCode::OK {
            bail!("login failed with {status}: {body}");
        }
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response without token: {body}"))
    }

    /// Signs up and logs in a fresh user, returning its id and token.
    pub async fn user_session(&self, email: &str) -> Result<(Uuid, String)> {
        let id = self.signup(email, "toto1234!").await?;
        let token = self.login(email, "toto1234!").await?;
        Ok((id, token))
    }

    pub async fn create_file(&self, token: &str, payload: Value) -> Result<(StatusCode, Value)> {
        let response = self.post_json("/files", &payload, Some(token)).await?;
        json_body(response).await
    }
}

pub fn basic_auth(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body<T: DeserializeOwned>(
    response: hyper::Response<Body>,
) -> Result<(StatusCode, T)> {
    let status = response.status();
    let bytes = body_to_vec(response.into_body()).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

/// Encodes a solid-colour PNG of the given dimensions.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encoding");
    out.into_inner()
}
