use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    jobs::{enqueue_welcome, WelcomePayload},
    models::User,
    routes::extract::ApiJson,
    state::AppState,
    utils::json::string_or_none,
};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let email = payload
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing email"))?;
    let password = payload
        .password
        .filter(|password| !password.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing password"))?;

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::bad_request("Already exist"));
    }

    // A concurrent signup can still win the race; the unique index settles it.
    let user = state
        .users
        .create(&email, &password::hash_password(&password))
        .await?
        .ok_or_else(|| AppError::bad_request("Already exist"))?;
    info!(user_id = %user.id, "user created");

    let welcome = WelcomePayload { user_id: user.id };
    if let Err(err) = enqueue_welcome(state.jobs.as_ref(), &welcome).await {
        warn!(user_id = %user.id, error = %err, "failed to enqueue welcome job");
    }

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    Ok(Json(user.into()))
}
