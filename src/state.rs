use std::sync::Arc;
use std::time::Duration;

use crate::{
    auth::{credentials::CredentialVerifier, session::SessionManager},
    cache::SessionCache,
    config::AppConfig,
    jobs::JobQueue,
    notify::Notifier,
    repository::{FileRepository, UserRepository},
    services::files::FileService,
    storage::ObjectStorage,
};

/// Handles to every collaborator, built once at startup and shared by the router
/// and the workers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn SessionCache>,
    pub users: Arc<dyn UserRepository>,
    pub files: Arc<dyn FileRepository>,
    pub jobs: Arc<dyn JobQueue>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn Notifier>,
    pub sessions: SessionManager,
    pub file_service: FileService,
    health_pool: Option<crate::db::PgPool>,
}

pub struct Collaborators {
    pub cache: Arc<dyn SessionCache>,
    pub users: Arc<dyn UserRepository>,
    pub files: Arc<dyn FileRepository>,
    pub jobs: Arc<dyn JobQueue>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(config: AppConfig, parts: Collaborators) -> Self {
        let verifier = CredentialVerifier::new(parts.users.clone());
        let sessions = SessionManager::new(
            parts.cache.clone(),
            verifier,
            Duration::from_secs(config.session_ttl_seconds),
        );
        let file_service = FileService::new(
            parts.files.clone(),
            parts.jobs.clone(),
            parts.storage.clone(),
        );

        Self {
            config: Arc::new(config),
            cache: parts.cache,
            users: parts.users,
            files: parts.files,
            jobs: parts.jobs,
            storage: parts.storage,
            notifier: parts.notifier,
            sessions,
            file_service,
            health_pool: None,
        }
    }

    /// Lets the status endpoint check the Postgres pool directly.
    pub fn with_health_pool(mut self, pool: crate::db::PgPool) -> Self {
        self.health_pool = Some(pool);
        self
    }

    pub async fn database_healthy(&self) -> bool {
        match &self.health_pool {
            Some(pool) => crate::db::is_healthy(pool).await,
            None => self.users.count().await.is_ok(),
        }
    }
}

impl AppState {
    /// Connects to Postgres, Redis and the byte store described by `config` and applies
    /// pending migrations.
    pub async fn connect(config: AppConfig, pool_size: u32) -> anyhow::Result<Self> {
        use anyhow::Context;

        use crate::{
            cache::RedisCache,
            config::StorageBackend,
            db,
            jobs::PgJobQueue,
            notify::LogNotifier,
            repository::{PgFileRepository, PgUserRepository},
            storage::{DiskStorage, S3Storage},
        };

        let pool = db::init_pool_with_size(&config.database_url, pool_size)?;
        {
            let pool = pool.clone();
            tokio::task::spawn_blocking(move || db::run_migrations(&pool))
                .await
                .context("migration task panicked")??;
        }

        let cache = RedisCache::connect(&config.redis_url)
            .await
            .context("failed to connect to redis")?;

        let storage: Arc<dyn ObjectStorage> = match config.storage_backend {
            StorageBackend::Disk => Arc::new(DiskStorage::new(config.folder_path.clone())),
            StorageBackend::S3 => {
                let bucket = config
                    .s3_bucket
                    .clone()
                    .context("S3_BUCKET must be set when STORAGE_BACKEND=s3")?;
                Arc::new(S3Storage::connect(&config, &bucket).await?)
            }
        };

        let parts = Collaborators {
            cache: Arc::new(cache),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            files: Arc::new(PgFileRepository::new(pool.clone())),
            jobs: Arc::new(PgJobQueue::new(pool.clone())),
            storage,
            notifier: Arc::new(LogNotifier),
        };
        Ok(Self::new(config, parts).with_health_pool(pool))
    }
}
