use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::{
    auth::TOKEN_HEADER,
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Serialize)]
pub struct ConnectResponse {
    pub token: String,
}

/// Exchanges `Authorization: Basic` credentials for a session token.
pub async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ConnectResponse>> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = state.sessions.login(authorization).await?;
    Ok(Json(ConnectResponse { token }))
}

pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(AppError::unauthorized)?;
    state.sessions.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
