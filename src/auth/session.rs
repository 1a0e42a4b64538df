//! Opaque session tokens kept in the expiring cache as `auth_<token> → user id`.
//!
//! Lifetimes are absolute: reads never extend a session, and expiry is left to
//! the cache.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheError, SessionCache};
use crate::repository::StoreError;

use super::credentials::{decode_basic_credentials, CredentialVerifier};

const KEY_PREFIX: &str = "auth_";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Clone)]
pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    verifier: CredentialVerifier,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(cache: Arc<dyn SessionCache>, verifier: CredentialVerifier, ttl: Duration) -> Self {
        Self {
            cache,
            verifier,
            ttl,
        }
    }

    /// Authenticates the `Basic` credentials in `authorization` and mints a token.
    pub async fn login(&self, authorization: Option<&str>) -> SessionResult<String> {
        let (email, password) = authorization
            .and_then(decode_basic_credentials)
            .ok_or(SessionError::Unauthorized)?;

        let user = self
            .verifier
            .verify(&email, &password)
            .await?
            .ok_or(SessionError::Unauthorized)?;

        let token = Uuid::new_v4().to_string();
        self.cache
            .set(&session_key(&token), &user.id.to_string(), self.ttl)
            .await?;
        info!(user_id = %user.id, "session opened");
        Ok(token)
    }

    pub async fn resolve(&self, token: &str) -> SessionResult<Uuid> {
        if token.is_empty() {
            return Err(SessionError::Unauthorized);
        }
        let value = self
            .cache
            .get(&session_key(token))
            .await?
            .ok_or(SessionError::Unauthorized)?;
        // A value we cannot parse was not written by us; treat the token as unknown.
        Uuid::parse_str(&value).map_err(|_| {
            debug!("session entry holds a malformed user id");
            SessionError::Unauthorized
        })
    }

    /// Revokes `token`. Logging out an unknown or already revoked token is `Unauthorized`.
    pub async fn logout(&self, token: &str) -> SessionResult<()> {
        let user_id = self.resolve(token).await?;
        self.cache.del(&session_key(token)).await?;
        info!(user_id = %user_id, "session closed");
        Ok(())
    }
}

fn session_key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}
