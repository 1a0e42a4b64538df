use axum::{
    body::Body,
    extract::{Json, Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::{AuthenticatedUser, MaybeAuthenticatedUser},
    error::{AppError, AppResult},
    models::{File, FileType, ParentRef},
    routes::extract::ApiJson,
    services::files::{ContentVariant, CreateFile},
    state::AppState,
    utils::json::{bool_or_false, classify_parent, string_or_none},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    #[serde(default, deserialize_with = "string_or_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "string_or_none")]
    pub file_type: Option<String>,
    pub parent_id: Option<Value>,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_public: bool,
    #[serde(default, deserialize_with = "string_or_none")]
    pub data: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub parent_id: Option<String>,
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct FileDataQuery {
    pub size: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub is_public: bool,
    pub parent_id: ParentRef,
}

impl From<File> for FileResponse {
    fn from(file: File) -> Self {
        Self {
            id: file.id,
            user_id: file.user_id,
            name: file.name,
            file_type: file.file_type,
            is_public: file.is_public,
            parent_id: file.parent,
        }
    }
}

/// File ids are opaque to clients; anything that is not one names no file.
fn parse_file_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found())
}

pub async fn create_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateFileRequest>,
) -> AppResult<(StatusCode, Json<FileResponse>)> {
    let request = CreateFile {
        name: payload.name,
        file_type: payload.file_type,
        parent: classify_parent(payload.parent_id.as_ref()).ok(),
        is_public: payload.is_public,
        data: payload.data,
    };
    let file = state.file_service.create(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(file.into())))
}

pub async fn get_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<FileResponse>> {
    let file_id = parse_file_id(&id)?;
    let file = state
        .file_service
        .get(Some(user.user_id), file_id)
        .await?;
    Ok(Json(file.into()))
}

pub async fn list_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListFilesQuery>,
) -> AppResult<Json<Vec<FileResponse>>> {
    let parent = match query.parent_id.as_deref() {
        None => Some(ParentRef::Root),
        Some(raw) => ParentRef::parse(raw),
    };
    let page = query
        .page
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);

    let files = state
        .file_service
        .list(user.user_id, parent, page)
        .await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

pub async fn publish_file(
    state: State<AppState>,
    user: AuthenticatedUser,
    id: Path<String>,
) -> AppResult<Json<FileResponse>> {
    set_visibility(state, user, id, true).await
}

pub async fn unpublish_file(
    state: State<AppState>,
    user: AuthenticatedUser,
    id: Path<String>,
) -> AppResult<Json<FileResponse>> {
    set_visibility(state, user, id, false).await
}

async fn set_visibility(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    is_public: bool,
) -> AppResult<Json<FileResponse>> {
    let file_id = parse_file_id(&id)?;
    let file = state
        .file_service
        .set_visibility(user.user_id, file_id, is_public)
        .await?;
    Ok(Json(file.into()))
}

pub async fn file_data(
    State(state): State<AppState>,
    MaybeAuthenticatedUser(requester): MaybeAuthenticatedUser,
    Path(id): Path<String>,
    Query(query): Query<FileDataQuery>,
) -> AppResult<Response> {
    let file_id = parse_file_id(&id)?;
    let variant = ContentVariant::from_size(query.size.as_deref())?;
    let (file, bytes) = state
        .file_service
        .read_content(requester, file_id, variant)
        .await?;

    let content_type = content_type_for(&file, variant, &bytes);
    Ok(([(CONTENT_TYPE, content_type)], Body::from(bytes)).into_response())
}

/// Originals are typed by their name. Thumbnails may have been re-encoded, so their
/// type comes from the bytes.
fn content_type_for(file: &File, variant: ContentVariant, bytes: &[u8]) -> String {
    let by_name = || {
        mime_guess::from_path(&file.name)
            .first_or_octet_stream()
            .to_string()
    };
    match variant {
        ContentVariant::Original => by_name(),
        ContentVariant::Thumbnail(_) => image::guess_format(bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| by_name()),
    }
}
