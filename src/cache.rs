//! Expiring key-value cache used for session tokens.
//!
//! [`SessionCache`] is the seam the session layer talks to; [`RedisCache`] is the
//! production implementation on top of a `redis` connection manager, which
//! reconnects on its own after transient failures.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache command error: {0}")]
    Command(String),

    #[error("cache command timed out")]
    Timeout,
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait SessionCache: Send + Sync + 'static {
    /// Stores `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Removes `key`, returning whether it existed.
    async fn del(&self, key: &str) -> CacheResult<bool>;

    async fn is_healthy(&self) -> bool;
}

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    command_timeout: Duration,
}

impl RedisCache {
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = Client::open(url)
            .map_err(|err| CacheError::Connection(format!("invalid redis url: {err}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| CacheError::Connection(format!("failed to connect: {err}")))?;
        Ok(Self {
            manager,
            command_timeout: Duration::from_secs(5),
        })
    }

    async fn with_timeout<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: std::future::Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(CacheError::from)
    }
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        self.with_timeout(conn.set_ex::<_, _, ()>(key, value, seconds))
            .await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        self.with_timeout(conn.get::<_, Option<String>>(key)).await
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: u32 = self.with_timeout(conn.del(key)).await?;
        Ok(deleted > 0)
    }

    async fn is_healthy(&self) -> bool {
        let mut conn = self.manager.clone();
        let pong: CacheResult<String> = self
            .with_timeout(redis::cmd("PING").query_async(&mut conn))
            .await;
        matches!(pong.as_deref(), Ok("PONG"))
    }
}
