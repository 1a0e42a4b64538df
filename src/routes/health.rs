use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::{error::AppResult, state::AppState};

#[derive(Serialize)]
pub struct StatusResponse {
    pub redis: bool,
    pub db: bool,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub users: i64,
    pub files: i64,
}

pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    let (redis, db) = tokio::join!(state.cache.is_healthy(), state.database_healthy());
    (StatusCode::OK, Json(StatusResponse { redis, db }))
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let (users, files) = tokio::try_join!(state.users.count(), state.files.count())?;
    Ok(Json(StatsResponse { users, files }))
}
