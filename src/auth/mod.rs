pub mod credentials;
pub mod password;
pub mod session;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub const TOKEN_HEADER: &str = "x-token";

/// The user behind the request's `X-Token` session token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Like [`AuthenticatedUser`], but a request without any token is let through as
/// anonymous. A token that is present but unknown is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthenticatedUser(pub Option<Uuid>);

fn token_from_parts(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or_else(AppError::unauthorized)?;
        let user_id = state.sessions.resolve(token).await?;
        Ok(AuthenticatedUser { user_id })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match token_from_parts(parts) {
            None => Ok(MaybeAuthenticatedUser(None)),
            Some(token) => {
                let user_id = state.sessions.resolve(token).await?;
                Ok(MaybeAuthenticatedUser(Some(user_id)))
            }
        }
    }
}
