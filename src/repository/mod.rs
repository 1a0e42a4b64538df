//! Storage traits for users and files, plus their Postgres implementations.
//!
//! The traits carry no authorization logic. Callers that need ownership or
//! visibility checks go through [`crate::services::files::FileService`].

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{PgPool, PgPooledConnection};
use crate::models::{File, NewFile, ParentRef, User};

pub mod files;
pub mod users;

pub use files::PgFileRepository;
pub use users::PgUserRepository;

/// Fixed listing page size.
pub const PAGE_SIZE: i64 = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database pool error: {0}")]
    Pool(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Inserts a new user. Returns `None` when the email is already taken.
    async fn create(&self, email: &str, password_hash: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait FileRepository: Send + Sync + 'static {
    /// Persists the record as given under a fresh id.
    async fn insert(&self, file: NewFile) -> StoreResult<File>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<File>>;

    /// Returns up to `page_size` files of `owner` directly under `parent`, in creation
    /// order, skipping `page * page_size` records.
    async fn find_children(
        &self,
        owner: Uuid,
        parent: ParentRef,
        page: i64,
        page_size: i64,
    ) -> StoreResult<Vec<File>>;

    /// Sets `is_public`, returning the updated record if it exists.
    async fn set_public(&self, id: Uuid, is_public: bool) -> StoreResult<Option<File>>;

    async fn count(&self) -> StoreResult<i64>;
}

/// Runs a diesel closure on the blocking pool with a pooled connection.
pub(crate) async fn with_conn<F, T>(pool: &PgPool, f: F) -> StoreResult<T>
where
    F: FnOnce(&mut PgPooledConnection) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|err| StoreError::Pool(err.to_string()))?;
        f(&mut conn)
    })
    .await
    .map_err(|err| StoreError::Task(err.to_string()))?
}

/// Offset for a zero-based page, saturating instead of overflowing on absurd input.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    page.max(0).saturating_mul(page_size)
}
