use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 86_400;
pub const DEFAULT_JOB_MAX_ATTEMPTS: i32 = 5;
pub const DEFAULT_JOB_LEASE_SECONDS: u64 = 600;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Disk,
    S3,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub folder_path: String,
    pub storage_backend: StorageBackend,
    pub session_ttl_seconds: u64,
    pub job_max_attempts: i32,
    /// How long a reserved job stays claimed before another worker may take it over.
    pub job_lease: Duration,
    pub worker_poll_interval: Duration,
    pub worker_concurrency: usize,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let folder_path =
            env::var("FOLDER_PATH").unwrap_or_else(|_| "/tmp/files_manager".to_string());
        let storage_backend = parse_storage_backend(
            &env::var("STORAGE_BACKEND").unwrap_or_else(|_| "disk".to_string()),
        )?;
        let session_ttl_seconds = env::var("SESSION_TTL_SECONDS")
            .unwrap_or_else(|_| DEFAULT_SESSION_TTL_SECONDS.to_string())
            .parse()
            .context("SESSION_TTL_SECONDS must be an integer")?;
        let job_max_attempts = env::var("JOB_MAX_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_JOB_MAX_ATTEMPTS.to_string())
            .parse()
            .context("JOB_MAX_ATTEMPTS must be an integer")?;
        let job_lease = env::var("JOB_LEASE_SECONDS")
            .unwrap_or_else(|_| DEFAULT_JOB_LEASE_SECONDS.to_string())
            .parse()
            .map(Duration::from_secs)
            .context("JOB_LEASE_SECONDS must be an integer")?;
        let worker_poll_interval = env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .map(Duration::from_millis)
            .context("WORKER_POLL_INTERVAL_MS must be an integer")?;
        let worker_concurrency = env::var("WORKER_CONCURRENCY")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(1usize)
            .max(1);
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").ok();

        if storage_backend == StorageBackend::S3 && s3_bucket.is_none() {
            bail!("S3_BUCKET must be set when STORAGE_BACKEND=s3");
        }

        Ok(Self {
            database_url,
            database_max_pool_size,
            redis_url,
            server_host,
            server_port,
            folder_path,
            storage_backend,
            session_ttl_seconds,
            job_max_attempts,
            job_lease,
            worker_poll_interval,
            worker_concurrency,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_url(&self.database_url)
    }

    pub fn redacted_redis_url(&self) -> String {
        redact_url(&self.redis_url)
    }
}

fn parse_storage_backend(raw: &str) -> Result<StorageBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "disk" | "local" => Ok(StorageBackend::Disk),
        "s3" => Ok(StorageBackend::S3),
        other => bail!("unsupported STORAGE_BACKEND {other:?}; expected disk or s3"),
    }
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
